//! Quorum confirmation protocol.
//!
//! Every irreversible ledger mutation is gated on more than two-thirds of
//! the current validator set independently attesting the same foreign-chain
//! evidence. Votes accumulate per order id, keyed by a digest of the
//! attested payload so that conflicting attestations never merge; vote
//! accumulation is commutative and idempotent, so replayed confirmation
//! sequences converge to the same outcome regardless of arrival order.

pub mod book;
pub mod error;
pub mod evidence;
pub mod tally;
pub mod validator_set;

pub use book::{ConfirmOutcome, ConfirmationBook};
pub use error::QuorumError;
pub use evidence::{EvidenceKeeper, MisbehaviourTracker};
pub use tally::{payload_digest, ConfirmTally, PayloadDigest};
pub use validator_set::ValidatorSet;
