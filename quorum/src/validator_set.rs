//! Validator-set snapshot and the quorum fraction.

use custos_types::ValidatorId;
use serde::{Deserialize, Serialize};

/// A snapshot of the current validator operators.
///
/// Confirmation entry points take this explicitly; the engine never reads
/// ambient validator state, so replay at any height uses the set that was
/// current then.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    operators: Vec<ValidatorId>,
}

impl ValidatorSet {
    pub fn new(mut operators: Vec<ValidatorId>) -> Self {
        operators.sort();
        operators.dedup();
        Self { operators }
    }

    pub fn contains(&self, operator: &ValidatorId) -> bool {
        self.operators.binary_search(operator).is_ok()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Strict BFT quorum: `votes` carries more than two-thirds of the set.
    ///
    /// Computed as `3·votes > 2·n` so no rounding enters the comparison.
    pub fn quorum_reached(&self, votes: usize) -> bool {
        3 * votes > 2 * self.operators.len()
    }

    pub fn operators(&self) -> &[ValidatorId] {
        &self.operators
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(n: usize) -> ValidatorSet {
        ValidatorSet::new((0..n).map(|i| ValidatorId::new(format!("val-{i}"))).collect())
    }

    #[test]
    fn four_validators_need_three_votes() {
        let s = set(4);
        assert!(!s.quorum_reached(1));
        assert!(!s.quorum_reached(2));
        assert!(s.quorum_reached(3));
        assert!(s.quorum_reached(4));
    }

    #[test]
    fn three_validators_need_three_votes() {
        // 2 of 3 is exactly two-thirds, which is not *more than* two-thirds.
        let s = set(3);
        assert!(!s.quorum_reached(2));
        assert!(s.quorum_reached(3));
    }

    #[test]
    fn duplicate_operators_collapse() {
        let v = ValidatorId::new("val-0");
        let s = ValidatorSet::new(vec![v.clone(), v.clone()]);
        assert_eq!(s.len(), 1);
        assert!(s.contains(&v));
    }
}
