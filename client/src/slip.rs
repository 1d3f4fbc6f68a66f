/// The amount the player intends to stake next.
///
/// Purely local: nothing here is validated against the balance until a bet
/// is actually placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BetSlip {
    amount: i64,
}

impl BetSlip {
    pub fn new(amount: i64) -> Self {
        Self {
            amount: amount.max(0),
        }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    pub fn set(&mut self, amount: i64) {
        self.amount = amount.max(0);
    }

    pub fn add(&mut self, delta: i64) {
        self.amount = self.amount.saturating_add(delta).max(0);
    }

    /// Scale by `factor`, rounding down.
    pub fn multiply(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            self.amount = 0;
            return;
        }
        // Float-to-int casts saturate.
        self.amount = (self.amount as f64 * factor).floor() as i64;
    }

    /// Stake the whole balance.
    pub fn all_in(&mut self, balance: i64) {
        self.set(balance);
    }

    pub fn clear(&mut self) {
        self.amount = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers() {
        let mut slip = BetSlip::default();
        assert!(slip.is_empty());

        slip.add(100);
        slip.add(25);
        assert_eq!(slip.amount(), 125);

        slip.multiply(2.0);
        assert_eq!(slip.amount(), 250);
        slip.multiply(0.5);
        assert_eq!(slip.amount(), 125);
        slip.multiply(0.5);
        assert_eq!(slip.amount(), 62);

        slip.all_in(16_986_566);
        assert_eq!(slip.amount(), 16_986_566);

        slip.clear();
        assert_eq!(slip.amount(), 0);
    }

    #[test]
    fn never_negative() {
        let mut slip = BetSlip::new(-5);
        assert_eq!(slip.amount(), 0);
        slip.add(10);
        slip.add(-50);
        assert_eq!(slip.amount(), 0);
        slip.set(40);
        slip.multiply(f64::NAN);
        assert_eq!(slip.amount(), 0);
        slip.all_in(-3);
        assert_eq!(slip.amount(), 0);
    }
}
