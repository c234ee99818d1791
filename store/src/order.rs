//! Order storage trait.

use crate::StoreError;
use custos_types::OrderId;

/// Trait for order storage.
///
/// Orders are owned by `custos-orders` and cross this boundary as
/// serialized bytes keyed by order id, so backends need no knowledge of the
/// order sum type.
pub trait OrderStore {
    /// Store an order (serialized bytes keyed by id).
    fn put_order(&self, id: &OrderId, order_bytes: &[u8]) -> Result<(), StoreError>;

    /// Retrieve an order by id.
    fn get_order(&self, id: &OrderId) -> Result<Vec<u8>, StoreError>;

    fn exists(&self, id: &OrderId) -> Result<bool, StoreError>;

    /// Delete an order (administrative cleanup only).
    fn delete_order(&self, id: &OrderId) -> Result<(), StoreError>;

    /// All stored order ids, in key order.
    fn order_ids(&self) -> Result<Vec<OrderId>, StoreError>;
}
