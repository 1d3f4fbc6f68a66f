use casino_types::{Color, HISTORY_CAPACITY};
use std::collections::VecDeque;

/// Most recent winning colors, newest first, never longer than
/// [`HISTORY_CAPACITY`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryTrack {
    entries: VecDeque<Color>,
}

impl HistoryTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new outcome, evicting the oldest when full.
    pub fn push(&mut self, color: Color) {
        self.entries.push_front(color);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Replace the whole track with a server-provided list (newest first).
    pub fn replace(&mut self, colors: &[Color]) {
        self.entries = colors.iter().take(HISTORY_CAPACITY).copied().collect();
    }

    pub fn latest(&self) -> Option<Color> {
        self.entries.front().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        self.entries.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Color> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casino_types::COLORS;

    #[test]
    fn newest_first() {
        let mut history = HistoryTrack::new();
        history.push(Color::Red);
        history.push(Color::Gold);
        assert_eq!(history.to_vec(), vec![Color::Gold, Color::Red]);
        assert_eq!(history.latest(), Some(Color::Gold));
    }

    #[test]
    fn eleventh_push_evicts_oldest() {
        let mut history = HistoryTrack::new();
        history.push(Color::Gold);
        for i in 0..10 {
            history.push(COLORS[i % 3]);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(!history.iter().any(|c| c == Color::Gold));
        // Newest is the last pushed.
        assert_eq!(history.latest(), Some(COLORS[9 % 3]));
    }

    #[test]
    fn replace_truncates_long_lists() {
        let mut history = HistoryTrack::new();
        history.push(Color::Blue);
        let long: Vec<Color> = (0..15).map(|i| COLORS[i % 4]).collect();
        history.replace(&long);
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.to_vec(), long[..HISTORY_CAPACITY].to_vec());

        history.replace(&[]);
        assert!(history.is_empty());
    }
}
