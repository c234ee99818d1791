//! Fixed-point amount type.
//!
//! All monetary values are raw integer units (u128) to avoid floating-point
//! error anywhere near settlement arithmetic. Fee rates are expressed in
//! basis points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis-point denominator used for all rate arithmetic.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// A foreign-chain or native coin amount in raw units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Sum a sequence of amounts; `None` if any partial sum overflows.
    ///
    /// There is deliberately no `Add`/`Sum` impl: amounts reach this crate
    /// from decoded foreign-chain data, so every accumulation must surface
    /// overflow instead of panicking.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::ZERO, Self::checked_add)
    }

    /// `self × rate_bps / 10_000`, rounding down; `None` on overflow.
    /// Used for fee rates.
    pub fn checked_mul_bps(self, rate_bps: u128) -> Option<Self> {
        self.0
            .checked_mul(rate_bps)
            .map(|scaled| Self(scaled / BPS_DENOMINATOR))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_underflow_is_none() {
        assert!(Amount::new(1).checked_sub(Amount::new(2)).is_none());
        assert_eq!(
            Amount::new(2).checked_sub(Amount::new(1)),
            Some(Amount::new(1))
        );
    }

    #[test]
    fn checked_sum_of_amounts() {
        let total = Amount::checked_sum([1u128, 2, 3].iter().map(|&r| Amount::new(r)));
        assert_eq!(total, Some(Amount::new(6)));
    }

    #[test]
    fn checked_sum_overflow_is_none() {
        let total = Amount::checked_sum([Amount::new(u128::MAX), Amount::new(1)]);
        assert_eq!(total, None);
    }

    #[test]
    fn checked_mul_bps_rounds_down() {
        // 1000 × 1.5% = 15
        assert_eq!(Amount::new(1000).checked_mul_bps(150), Some(Amount::new(15)));
        // 999 × 1 bps = 0.0999 → 0
        assert_eq!(Amount::new(999).checked_mul_bps(1), Some(Amount::ZERO));
    }

    #[test]
    fn checked_mul_bps_overflow_is_none() {
        assert_eq!(Amount::new(u128::MAX).checked_mul_bps(2), None);
    }
}
