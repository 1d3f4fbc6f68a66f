//! Per-round aggregation of bets by color and player.
//!
//! Invariant: for every color, `total == Σ player amounts`, and the local
//! player's `own` total is one of those amounts (so `own <= total`).

use crate::ProtocolError;
use casino_types::{BetEntry, Color, COLORS};
use std::collections::HashMap;
use tracing::warn;

/// Accumulated amount for one player on one color.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stake {
    pub player: String,
    pub amount: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct ColorBook {
    /// First-seen order.
    stakes: Vec<Stake>,
    index: HashMap<String, usize>,
    total: i64,
    own: i64,
}

impl ColorBook {
    /// Returns false, leaving the book untouched, if any sum would overflow.
    fn add(&mut self, player: &str, amount: i64, own: bool) -> bool {
        let slot = self.index.get(player).copied();
        let current = slot.map_or(0, |slot| self.stakes[slot].amount);
        let (Some(stake), Some(total), Some(own_total)) = (
            current.checked_add(amount),
            self.total.checked_add(amount),
            if own { self.own.checked_add(amount) } else { Some(self.own) },
        ) else {
            return false;
        };

        match slot {
            Some(slot) => self.stakes[slot].amount = stake,
            None => {
                self.index.insert(player.to_string(), self.stakes.len());
                self.stakes.push(Stake {
                    player: player.to_string(),
                    amount: stake,
                });
            }
        }
        self.total = total;
        self.own = own_total;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetLedger {
    local_player: String,
    books: [ColorBook; 4],
}

impl BetLedger {
    pub fn new(local_player: impl Into<String>) -> Self {
        Self {
            local_player: local_player.into(),
            books: Default::default(),
        }
    }

    pub fn local_player(&self) -> &str {
        &self.local_player
    }

    /// Forget every bet.
    pub fn reset(&mut self) {
        self.books = Default::default();
    }

    /// Add `amount` to `player`'s stake on `color`.
    ///
    /// Non-positive amounts are a protocol violation: they are logged and
    /// rejected without touching the ledger.
    pub fn record(&mut self, color: Color, player: &str, amount: i64) -> Result<(), ProtocolError> {
        if amount <= 0 {
            warn!(%color, player, amount, "rejecting non-positive bet");
            return Err(ProtocolError::NonPositiveAmount {
                color,
                player: player.to_string(),
                amount,
            });
        }
        let own = player == self.local_player;
        if !self.books[color.index()].add(player, amount, own) {
            warn!(%color, player, amount, "rejecting bet that overflows the ledger");
            return Err(ProtocolError::AmountOverflow {
                color,
                player: player.to_string(),
                amount,
            });
        }
        Ok(())
    }

    /// Record every entry in order, skipping (and logging) invalid ones.
    /// Returns the number of entries applied.
    pub fn apply_entries(&mut self, entries: &[BetEntry]) -> usize {
        entries
            .iter()
            .filter(|entry| {
                self.record(entry.color, &entry.username, entry.amount)
                    .is_ok()
            })
            .count()
    }

    /// Replace the ledger with exactly the bets in a snapshot.
    ///
    /// Applying the same snapshot any number of times yields the same ledger.
    pub fn rebuild_from_snapshot(&mut self, entries: &[BetEntry]) -> usize {
        self.reset();
        self.apply_entries(entries)
    }

    pub fn total(&self, color: Color) -> i64 {
        self.books[color.index()].total
    }

    pub fn own_total(&self, color: Color) -> i64 {
        self.books[color.index()].own
    }

    /// Totals in tile order.
    pub fn totals(&self) -> [i64; 4] {
        COLORS.map(|color| self.total(color))
    }

    pub fn own_totals(&self) -> [i64; 4] {
        COLORS.map(|color| self.own_total(color))
    }

    pub fn player_amount(&self, color: Color, player: &str) -> i64 {
        let book = &self.books[color.index()];
        book.index
            .get(player)
            .map(|slot| book.stakes[*slot].amount)
            .unwrap_or(0)
    }

    /// Players on `color`, largest stake first. Ties keep first-seen order.
    pub fn ranked(&self, color: Color) -> Vec<Stake> {
        let mut stakes = self.books[color.index()].stakes.clone();
        // `sort_by` is stable, so equal amounts stay in insertion order.
        stakes.sort_by(|a, b| b.amount.cmp(&a.amount));
        stakes
    }

    pub fn is_empty(&self) -> bool {
        self.books.iter().all(|book| book.stakes.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(color: Color, username: &str, amount: i64) -> BetEntry {
        BetEntry {
            color,
            username: username.to_string(),
            amount,
        }
    }

    #[test]
    fn record_accumulates_instead_of_overwriting() {
        let mut ledger = BetLedger::new("me");
        ledger.record(Color::Red, "alice", 100).unwrap();
        ledger.record(Color::Red, "alice", 50).unwrap();
        ledger.record(Color::Red, "me", 25).unwrap();

        assert_eq!(ledger.player_amount(Color::Red, "alice"), 150);
        assert_eq!(ledger.total(Color::Red), 175);
        assert_eq!(ledger.own_total(Color::Red), 25);
        assert_eq!(ledger.total(Color::Gray), 0);
    }

    #[test]
    fn own_gold_bet_from_zero() {
        let mut ledger = BetLedger::new("self");
        assert_eq!(ledger.total(Color::Gold), 0);
        ledger.record(Color::Gold, "self", 50).unwrap();
        assert_eq!(ledger.total(Color::Gold), 50);
        assert_eq!(ledger.own_total(Color::Gold), 50);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut ledger = BetLedger::new("me");
        let err = ledger.record(Color::Blue, "mallory", 0).unwrap_err();
        assert!(matches!(err, ProtocolError::NonPositiveAmount { amount: 0, .. }));
        assert!(ledger.record(Color::Blue, "mallory", -10).is_err());
        assert!(ledger.is_empty());
    }

    #[test]
    fn overflowing_amounts_are_rejected_whole() {
        let mut ledger = BetLedger::new("me");
        ledger.record(Color::Gold, "whale", i64::MAX - 10).unwrap();

        // A new player would push the color total past the limit.
        let err = ledger.record(Color::Gold, "me", 20).unwrap_err();
        assert!(matches!(err, ProtocolError::AmountOverflow { amount: 20, .. }));
        assert_eq!(ledger.player_amount(Color::Gold, "me"), 0);
        assert_eq!(ledger.own_total(Color::Gold), 0);
        assert_eq!(ledger.ranked(Color::Gold).len(), 1);

        assert!(ledger.record(Color::Gold, "whale", 11).is_err());
        ledger.record(Color::Gold, "me", 10).unwrap();
        let sum: i64 = ledger.ranked(Color::Gold).iter().map(|s| s.amount).sum();
        assert_eq!(ledger.total(Color::Gold), i64::MAX);
        assert_eq!(sum, ledger.total(Color::Gold));
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let mut ledger = BetLedger::new("me");
        ledger.record(Color::Gray, "first", 10).unwrap();
        ledger.record(Color::Gray, "second", 30).unwrap();
        ledger.record(Color::Gray, "third", 10).unwrap();
        ledger.record(Color::Gray, "fourth", 20).unwrap();

        let names: Vec<_> = ledger
            .ranked(Color::Gray)
            .into_iter()
            .map(|stake| stake.player)
            .collect();
        assert_eq!(names, vec!["second", "fourth", "first", "third"]);
    }

    #[test]
    fn snapshot_skips_invalid_entries() {
        let mut ledger = BetLedger::new("me");
        let applied = ledger.rebuild_from_snapshot(&[
            entry(Color::Red, "a", 10),
            entry(Color::Red, "b", 0),
            entry(Color::Blue, "me", 5),
        ]);
        assert_eq!(applied, 2);
        assert_eq!(ledger.totals(), [0, 10, 5, 0]);
        assert_eq!(ledger.own_totals(), [0, 0, 5, 0]);
    }

    #[test]
    fn snapshot_replaces_previous_state() {
        let mut ledger = BetLedger::new("me");
        ledger.record(Color::Gold, "ghost", 999).unwrap();
        ledger.rebuild_from_snapshot(&[entry(Color::Red, "a", 10)]);
        assert_eq!(ledger.total(Color::Gold), 0);
        assert_eq!(ledger.player_amount(Color::Gold, "ghost"), 0);
        assert_eq!(ledger.total(Color::Red), 10);
    }

    fn arb_color() -> impl Strategy<Value = Color> {
        prop::sample::select(COLORS.to_vec())
    }

    fn arb_entries() -> impl Strategy<Value = Vec<BetEntry>> {
        prop::collection::vec(
            (
                arb_color(),
                prop::sample::select(vec!["me", "alice", "bob", "carol"]),
                -5i64..500,
            )
                .prop_map(|(color, name, amount)| entry(color, name, amount)),
            0..64,
        )
    }

    proptest! {
        #[test]
        fn totals_equal_sum_of_players(entries in arb_entries()) {
            let mut ledger = BetLedger::new("me");
            ledger.apply_entries(&entries);
            for color in COLORS {
                let sum: i64 = ledger.ranked(color).iter().map(|s| s.amount).sum();
                prop_assert_eq!(ledger.total(color), sum);
                prop_assert!(ledger.own_total(color) <= ledger.total(color));
                prop_assert_eq!(ledger.own_total(color), ledger.player_amount(color, "me"));
            }
        }

        #[test]
        fn rebuild_is_idempotent(entries in arb_entries(), noise in arb_entries()) {
            let mut once = BetLedger::new("me");
            once.rebuild_from_snapshot(&entries);

            let mut twice = BetLedger::new("me");
            twice.apply_entries(&noise);
            twice.rebuild_from_snapshot(&entries);
            twice.rebuild_from_snapshot(&entries);

            prop_assert_eq!(once, twice);
        }
    }
}
