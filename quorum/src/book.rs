//! The confirmation book — vote submission over the persistent tally store.

use crate::error::QuorumError;
use crate::tally::{ConfirmTally, PayloadDigest};
use crate::validator_set::ValidatorSet;
use custos_store::vote::VoteStore;
use custos_types::{OrderId, ValidatorId};

/// Result of recording one confirmation vote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Vote recorded (or duplicate); quorum not yet reached.
    Pending { votes: usize },
    /// This vote carried the payload past the two-thirds threshold. The
    /// caller must now execute the gated mutation and then [`ConfirmationBook::conclude`].
    Quorum {
        votes: usize,
        /// Validators whose latest vote attested a different payload.
        conflicting: Vec<ValidatorId>,
    },
}

/// Accumulates confirmation votes per order id.
///
/// The book itself never executes anything: it tells the caller when one
/// payload has quorum, the caller applies the ledger mutation, and only a
/// successful execution concludes (clears) the tally. A failed execution
/// leaves the tally intact for the corrected resubmission.
pub struct ConfirmationBook<'a, V: VoteStore> {
    votes: &'a V,
}

impl<'a, V: VoteStore> ConfirmationBook<'a, V> {
    pub fn new(votes: &'a V) -> Self {
        Self { votes }
    }

    fn load(&self, id: &OrderId) -> Result<ConfirmTally, QuorumError> {
        match self.votes.get_tally(id)? {
            Some(bytes) => {
                bincode::deserialize(&bytes).map_err(|e| QuorumError::Codec(e.to_string()))
            }
            None => Ok(ConfirmTally::new()),
        }
    }

    fn save(&self, id: &OrderId, tally: &ConfirmTally) -> Result<(), QuorumError> {
        let bytes = bincode::serialize(tally).map_err(|e| QuorumError::Codec(e.to_string()))?;
        self.votes.put_tally(id, &bytes)?;
        Ok(())
    }

    /// Record `validator`'s attestation of `digest` for `order_id`.
    ///
    /// Rejects callers outside the validator set. Duplicate votes are
    /// accepted no-ops. Quorum is reported only on the call that crosses
    /// the threshold or any later call while the tally still stands, so a
    /// failed execution can be retried by the next confirmation.
    pub fn submit(
        &self,
        order_id: &OrderId,
        validator: &ValidatorId,
        digest: PayloadDigest,
        validators: &ValidatorSet,
    ) -> Result<ConfirmOutcome, QuorumError> {
        if !validators.contains(validator) {
            return Err(QuorumError::NotValidator(validator.to_string()));
        }

        let mut tally = self.load(order_id)?;
        tally.add_vote(validator, digest);
        self.save(order_id, &tally)?;

        let votes = tally.votes_for(&digest);
        if validators.quorum_reached(votes) {
            Ok(ConfirmOutcome::Quorum {
                votes,
                conflicting: tally.conflicting_voters(&digest),
            })
        } else {
            Ok(ConfirmOutcome::Pending { votes })
        }
    }

    /// Clear an order's tally after the gated mutation has been applied.
    pub fn conclude(&self, order_id: &OrderId) -> Result<(), QuorumError> {
        self.votes.delete_tally(order_id)?;
        Ok(())
    }

    /// Distinct voters currently recorded for an order.
    pub fn voter_count(&self, order_id: &OrderId) -> Result<usize, QuorumError> {
        Ok(self.load(order_id)?.total_voters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::payload_digest;
    use custos_nullables::NullStore;

    fn val(i: u32) -> ValidatorId {
        ValidatorId::new(format!("val-{i}"))
    }

    fn four() -> ValidatorSet {
        ValidatorSet::new((0..4).map(val).collect())
    }

    #[test]
    fn third_distinct_vote_reaches_quorum() {
        let store = NullStore::new();
        let book = ConfirmationBook::new(&store);
        let id = OrderId::random();
        let d = payload_digest(b"evidence");
        let set = four();

        assert_eq!(
            book.submit(&id, &val(0), d, &set).unwrap(),
            ConfirmOutcome::Pending { votes: 1 }
        );
        assert_eq!(
            book.submit(&id, &val(1), d, &set).unwrap(),
            ConfirmOutcome::Pending { votes: 2 }
        );
        match book.submit(&id, &val(2), d, &set).unwrap() {
            ConfirmOutcome::Quorum { votes, conflicting } => {
                assert_eq!(votes, 3);
                assert!(conflicting.is_empty());
            }
            other => panic!("expected quorum, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_votes_do_not_advance_quorum() {
        let store = NullStore::new();
        let book = ConfirmationBook::new(&store);
        let id = OrderId::random();
        let d = payload_digest(b"evidence");
        let set = four();

        for _ in 0..5 {
            let outcome = book.submit(&id, &val(0), d, &set).unwrap();
            assert_eq!(outcome, ConfirmOutcome::Pending { votes: 1 });
        }
    }

    #[test]
    fn non_validator_rejected() {
        let store = NullStore::new();
        let book = ConfirmationBook::new(&store);
        let id = OrderId::random();
        let d = payload_digest(b"evidence");

        let outsider = ValidatorId::new("intruder");
        assert!(matches!(
            book.submit(&id, &outsider, d, &four()),
            Err(QuorumError::NotValidator(_))
        ));
    }

    #[test]
    fn conflicting_payload_reported_at_quorum() {
        let store = NullStore::new();
        let book = ConfirmationBook::new(&store);
        let id = OrderId::random();
        let good = payload_digest(b"evidence");
        let bad = payload_digest(b"forged");
        let set = four();

        book.submit(&id, &val(3), bad, &set).unwrap();
        book.submit(&id, &val(0), good, &set).unwrap();
        book.submit(&id, &val(1), good, &set).unwrap();
        match book.submit(&id, &val(2), good, &set).unwrap() {
            ConfirmOutcome::Quorum { votes, conflicting } => {
                assert_eq!(votes, 3);
                assert_eq!(conflicting, vec![val(3)]);
            }
            other => panic!("expected quorum, got {other:?}"),
        }
    }

    #[test]
    fn conclude_clears_the_tally() {
        let store = NullStore::new();
        let book = ConfirmationBook::new(&store);
        let id = OrderId::random();
        let d = payload_digest(b"evidence");
        let set = four();

        book.submit(&id, &val(0), d, &set).unwrap();
        book.submit(&id, &val(1), d, &set).unwrap();
        book.submit(&id, &val(2), d, &set).unwrap();
        book.conclude(&id).unwrap();

        assert_eq!(book.voter_count(&id).unwrap(), 0);
        // A fresh vote after conclusion starts a new tally.
        assert_eq!(
            book.submit(&id, &val(3), d, &set).unwrap(),
            ConfirmOutcome::Pending { votes: 1 }
        );
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let d = payload_digest(b"evidence");
        let set = four();

        // Two permutations of the same vote sequence converge.
        for perm in [[0u32, 1, 2], [2, 0, 1]] {
            let store = NullStore::new();
            let book = ConfirmationBook::new(&store);
            let id = OrderId::random();
            let mut last = ConfirmOutcome::Pending { votes: 0 };
            for i in perm {
                last = book.submit(&id, &val(i), d, &set).unwrap();
            }
            assert!(matches!(last, ConfirmOutcome::Quorum { votes: 3, .. }));
        }
    }
}
