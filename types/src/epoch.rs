//! Validator-set rotation epochs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validator-set rotation period. OPCU signing addresses rotate per epoch;
/// asset address entries older than two epochs are pruned from the ledger.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Epoch(u64);

impl Epoch {
    pub const ZERO: Self = Self(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn prev(&self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// Whether `self` is strictly more than `window` epochs behind `current`.
    pub fn is_stale(&self, current: Epoch, window: u64) -> bool {
        current.0.saturating_sub(self.0) > window
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_window() {
        let e = Epoch::new(3);
        assert!(!e.is_stale(Epoch::new(5), 2));
        assert!(e.is_stale(Epoch::new(6), 2));
    }

    #[test]
    fn prev_of_zero_is_none() {
        assert!(Epoch::ZERO.prev().is_none());
        assert_eq!(Epoch::new(2).prev(), Some(Epoch::new(1)));
    }
}
