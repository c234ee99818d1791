//! Confirmation vote tally storage trait.

use crate::StoreError;
use custos_types::OrderId;

/// Trait for per-order confirmation tallies.
///
/// Tallies are owned by `custos-quorum` and stored as serialized bytes —
/// no ambient global vote state; every tally is an explicit store entry
/// keyed by the order id it gates.
pub trait VoteStore {
    /// Retrieve the tally for an order, or `None` if no votes yet.
    fn get_tally(&self, id: &OrderId) -> Result<Option<Vec<u8>>, StoreError>;

    fn put_tally(&self, id: &OrderId, tally_bytes: &[u8]) -> Result<(), StoreError>;

    /// Clear the tally once quorum has executed.
    fn delete_tally(&self, id: &OrderId) -> Result<(), StoreError>;
}
