//! Wheel geometry and spin animation.
//!
//! The wheel only ever turns forward. Every spin lands the winning slot's
//! center under the fixed pointer after at least [`MIN_REVOLUTIONS`] full
//! turns, and the accumulated rotation never decreases for the lifetime of
//! the session.

use casino_types::{Color, SLOT_COUNT, WHEEL};
use std::time::{Duration, Instant};

/// Angle of one slot, in degrees.
pub const SLOT_ANGLE: f64 = 360.0 / SLOT_COUNT as f64;

/// Where the pointer sits, in wheel-frame degrees.
pub const POINTER_ANGLE: f64 = 270.0;

/// Full turns a spin makes before landing.
pub const MIN_REVOLUTIONS: u32 = 5;

/// Time from spin trigger to rest.
pub const SPIN_DURATION: Duration = Duration::from_millis(3_000);

const EASING: CubicBezier = CubicBezier {
    x1: 0.17,
    y1: 0.67,
    x2: 0.12,
    y2: 0.99,
};

/// Center of `slot`, measured from slot 0's leading edge.
pub fn slot_center(slot: u8) -> f64 {
    slot as f64 * SLOT_ANGLE + SLOT_ANGLE / 2.0
}

/// Rotation (mod 360) that puts `slot`'s center under the pointer.
pub fn target_offset(slot: u8) -> f64 {
    (POINTER_ANGLE - slot_center(slot)).rem_euclid(360.0)
}

/// Smallest rotation `>= base + 5 turns` that lands on `slot`.
pub fn final_rotation(base: f64, slot: u8) -> f64 {
    landing_at_least(base + MIN_REVOLUTIONS as f64 * 360.0, slot)
}

fn landing_at_least(min: f64, slot: u8) -> f64 {
    let offset = target_offset(slot);
    let turns = ((min - offset) / 360.0).ceil();
    offset + turns * 360.0
}

/// Slot under the pointer when the wheel is rotated by `rotation` degrees.
pub fn slot_under_pointer(rotation: f64) -> u8 {
    let wheel_frame = (POINTER_ANGLE - rotation).rem_euclid(360.0);
    ((wheel_frame / SLOT_ANGLE).floor() as usize % SLOT_COUNT) as u8
}

pub fn color_under_pointer(rotation: f64) -> Color {
    WHEEL[slot_under_pointer(rotation) as usize]
}

/// CSS-style cubic bezier timing curve with fixed end points (0,0) and (1,1).
#[derive(Clone, Copy, Debug)]
struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl CubicBezier {
    fn sample(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * t * a1 + 3.0 * u * t * t * a2 + t * t * t
    }

    fn slope(a1: f64, a2: f64, t: f64) -> f64 {
        let u = 1.0 - t;
        3.0 * u * u * a1 + 6.0 * u * t * (a2 - a1) + 3.0 * t * t * (1.0 - a2)
    }

    /// Curve parameter whose x equals `x`.
    fn solve(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..8 {
            let error = Self::sample(self.x1, self.x2, t) - x;
            if error.abs() < 1e-7 {
                return t;
            }
            let slope = Self::slope(self.x1, self.x2, t);
            if slope.abs() < 1e-6 {
                break;
            }
            t -= error / slope;
        }

        // Newton stalled; bisect.
        let (mut lo, mut hi) = (0.0, 1.0);
        t = x;
        for _ in 0..64 {
            let value = Self::sample(self.x1, self.x2, t);
            if (value - x).abs() < 1e-7 {
                break;
            }
            if value < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) / 2.0;
        }
        t
    }

    fn ease(&self, progress: f64) -> f64 {
        if progress <= 0.0 {
            return 0.0;
        }
        if progress >= 1.0 {
            return 1.0;
        }
        let t = self.solve(progress).clamp(0.0, 1.0);
        Self::sample(self.y1, self.y2, t)
    }
}

/// One in-flight spin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinAnimation {
    pub slot: u8,
    pub from: f64,
    pub to: f64,
    pub started_at: Instant,
    pub duration: Duration,
}

impl SpinAnimation {
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn angle_at(&self, now: Instant) -> f64 {
        self.from + (self.to - self.from) * EASING.ease(self.progress(now))
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Session-long wheel state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wheel {
    accumulated: f64,
    animation: Option<SpinAnimation>,
}

impl Wheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rotation the wheel is at, or heading to.
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    pub fn animation(&self) -> Option<&SpinAnimation> {
        self.animation.as_ref()
    }

    /// Rotation currently on screen.
    pub fn angle_at(&self, now: Instant) -> f64 {
        match &self.animation {
            Some(animation) => animation.angle_at(now),
            None => self.accumulated,
        }
    }

    pub fn is_spinning(&self, now: Instant) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|animation| !animation.is_finished(now))
    }

    /// Start spinning toward `slot`, superseding any spin still in flight.
    ///
    /// The new spin starts from the angle on screen and makes at least five
    /// full turns from there; it also never lands short of the accumulated
    /// rotation, so the wheel keeps moving forward.
    pub fn spin(&mut self, slot: u8, now: Instant) -> SpinAnimation {
        let from = self.angle_at(now);
        let to = final_rotation(from, slot).max(landing_at_least(self.accumulated, slot));
        let animation = SpinAnimation {
            slot,
            from,
            to,
            started_at: now,
            duration: SPIN_DURATION,
        };
        self.accumulated = to;
        self.animation = Some(animation);
        animation
    }
}
