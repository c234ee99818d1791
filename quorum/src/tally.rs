//! Per-order confirmation tallies.

use blake2::{Blake2s256, Digest};
use custos_types::ValidatorId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Digest of a confirmation payload. Two validators have voted "the same"
/// only when their payload digests match bit-for-bit.
pub type PayloadDigest = [u8; 32];

/// Hash an attested payload (the serialized arguments of the confirmation
/// call) into its vote key.
pub fn payload_digest(payload: &[u8]) -> PayloadDigest {
    let mut hasher = Blake2s256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// The vote state of one order awaiting quorum.
///
/// Votes are keyed by payload digest so conflicting attestations accumulate
/// separately; each validator's latest vote is also tracked so a validator
/// re-voting a different payload does not count twice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmTally {
    /// Validators per attested payload.
    votes: BTreeMap<PayloadDigest, BTreeSet<ValidatorId>>,
    /// Latest payload each validator attested.
    by_validator: BTreeMap<ValidatorId, PayloadDigest>,
}

impl ConfirmTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote. Returns `true` if the vote changed the tally
    /// (duplicate identical votes are no-ops).
    pub fn add_vote(&mut self, validator: &ValidatorId, digest: PayloadDigest) -> bool {
        if let Some(prev) = self.by_validator.get(validator) {
            if *prev == digest {
                return false;
            }
            // Re-vote for a different payload: move the validator over.
            let prev = *prev;
            if let Some(set) = self.votes.get_mut(&prev) {
                set.remove(validator);
                if set.is_empty() {
                    self.votes.remove(&prev);
                }
            }
        }
        self.by_validator.insert(validator.clone(), digest);
        self.votes.entry(digest).or_default().insert(validator.clone())
    }

    /// Number of distinct validators behind one payload.
    pub fn votes_for(&self, digest: &PayloadDigest) -> usize {
        self.votes.get(digest).map_or(0, BTreeSet::len)
    }

    /// Total distinct validators that have voted anything.
    pub fn total_voters(&self) -> usize {
        self.by_validator.len()
    }

    /// Validators whose latest vote disagrees with `winner`.
    pub fn conflicting_voters(&self, winner: &PayloadDigest) -> Vec<ValidatorId> {
        self.by_validator
            .iter()
            .filter(|(_, d)| *d != winner)
            .map(|(v, _)| v.clone())
            .collect()
    }
}

/// Hex form of a digest, for logs.
pub fn digest_hex(digest: &PayloadDigest) -> String {
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(i: u32) -> ValidatorId {
        ValidatorId::new(format!("val-{i}"))
    }

    #[test]
    fn distinct_validators_accumulate() {
        let d = payload_digest(b"evidence");
        let mut tally = ConfirmTally::new();
        assert!(tally.add_vote(&val(0), d));
        assert!(tally.add_vote(&val(1), d));
        assert_eq!(tally.votes_for(&d), 2);
    }

    #[test]
    fn duplicate_vote_is_a_noop() {
        let d = payload_digest(b"evidence");
        let mut tally = ConfirmTally::new();
        assert!(tally.add_vote(&val(0), d));
        assert!(!tally.add_vote(&val(0), d));
        assert_eq!(tally.votes_for(&d), 1);
    }

    #[test]
    fn conflicting_payloads_never_merge() {
        let good = payload_digest(b"evidence");
        let bad = payload_digest(b"forged");
        let mut tally = ConfirmTally::new();
        tally.add_vote(&val(0), good);
        tally.add_vote(&val(1), good);
        tally.add_vote(&val(2), bad);

        assert_eq!(tally.votes_for(&good), 2);
        assert_eq!(tally.votes_for(&bad), 1);
        assert_eq!(tally.conflicting_voters(&good), vec![val(2)]);
    }

    #[test]
    fn revote_moves_the_validator() {
        let a = payload_digest(b"a");
        let b = payload_digest(b"b");
        let mut tally = ConfirmTally::new();
        tally.add_vote(&val(0), a);
        tally.add_vote(&val(0), b);

        assert_eq!(tally.votes_for(&a), 0);
        assert_eq!(tally.votes_for(&b), 1);
        assert_eq!(tally.total_voters(), 1);
    }

    #[test]
    fn digest_is_stable() {
        assert_eq!(payload_digest(b"x"), payload_digest(b"x"));
        assert_ne!(payload_digest(b"x"), payload_digest(b"y"));
    }
}
