use std::time::{Duration, Instant};

/// How often the display refreshes the countdown. Purely cosmetic; the
/// deadline itself only ever comes from the server.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on a server-provided countdown.
const MAX_COUNTDOWN: Duration = Duration::from_secs(3_600);

/// Betting countdown for the active round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Countdown {
    /// No round yet.
    #[default]
    Idle,
    /// Betting closes at `deadline`.
    Running { deadline: Instant },
    /// Bets are locked; the display is frozen.
    Pinned,
}

impl Countdown {
    /// Countdown ending `seconds` after `now`.
    pub fn start(now: Instant, seconds: f64) -> Self {
        let remaining = if seconds.is_finite() && seconds > 0.0 {
            Duration::try_from_secs_f64(seconds)
                .unwrap_or(MAX_COUNTDOWN)
                .min(MAX_COUNTDOWN)
        } else {
            Duration::ZERO
        };
        Countdown::Running {
            deadline: now + remaining,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Countdown::Running { deadline } => Some(*deadline),
            _ => None,
        }
    }

    /// `max(0, deadline - now)` while running.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Whether the display still needs refreshing.
    pub fn is_ticking(&self, now: Instant) -> bool {
        self.remaining(now).is_some_and(|left| !left.is_zero())
    }

    pub fn label(&self, now: Instant) -> String {
        match self {
            Countdown::Idle => "--".to_string(),
            Countdown::Running { .. } => {
                let left = self.remaining(now).unwrap_or_default();
                format!("{:.2}s", left.as_secs_f64())
            }
            Countdown::Pinned => "SPIN!".to_string(),
        }
    }
}
