//! Roulette wheel vocabulary.
//!
//! The wheel has 54 equally sized slots painted in four colors:
//! 26 gray (x2), 17 red (x3), 10 blue (x5) and a single gold slot (x50).
//! The layout is fixed and shared with the server; a winning slot index
//! always maps to the same color on both sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of slots on the wheel.
pub const SLOT_COUNT: usize = 54;

/// Maximum number of past outcomes kept in the history strip.
pub const HISTORY_CAPACITY: usize = 10;

/// A betting color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Gray,
    Red,
    Blue,
    Gold,
}

/// All colors in tile order.
pub const COLORS: [Color; 4] = [Color::Gray, Color::Red, Color::Blue, Color::Gold];

/// Slot layout, index 0 first, clockwise.
pub const WHEEL: [Color; SLOT_COUNT] = {
    use Color::{Blue as B, Gold as Y, Gray as G, Red as R};
    [
        Y, B, G, R, G, R, G, R, G, //
        B, G, B, G, R, G, R, G, R, G, //
        B, G, B, G, R, G, R, G, R, G, R, G, R, G, //
        B, G, B, G, R, G, R, G, R, G, //
        B, G, B, G, R, G, R, G, R, G, //
        B,
    ]
};

impl Color {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Gray => "GRAY",
            Color::Red => "RED",
            Color::Blue => "BLUE",
            Color::Gold => "GOLD",
        }
    }

    /// Total returned for a winning bet, as a multiple of the stake.
    pub fn multiplier(&self) -> u64 {
        match self {
            Color::Gray => 2,
            Color::Red => 3,
            Color::Blue => 5,
            Color::Gold => 50,
        }
    }

    /// Number of slots painted in this color.
    pub fn slot_count(&self) -> usize {
        match self {
            Color::Gray => 26,
            Color::Red => 17,
            Color::Blue => 10,
            Color::Gold => 1,
        }
    }

    /// Chance of landing on this color, in percent.
    pub fn probability(&self) -> f64 {
        self.slot_count() as f64 / SLOT_COUNT as f64 * 100.0
    }

    /// Position of this color in [`COLORS`].
    pub fn index(&self) -> usize {
        match self {
            Color::Gray => 0,
            Color::Red => 1,
            Color::Blue => 2,
            Color::Gold => 3,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a color name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GRAY" | "GREY" => Ok(Color::Gray),
            "RED" => Ok(Color::Red),
            "BLUE" => Ok(Color::Blue),
            "GOLD" => Ok(Color::Gold),
            _ => Err(UnknownColor(s.to_string())),
        }
    }
}

/// Color of a slot, or `None` if the index is off the wheel.
pub fn slot_color(slot: u8) -> Option<Color> {
    WHEEL.get(slot as usize).copied()
}
