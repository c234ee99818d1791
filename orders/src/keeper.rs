//! The order keeper — typed access and state-machine enforcement over the
//! order store.

use crate::error::OrderError;
use crate::order::Order;
use crate::status::OrderStatus;
use custos_store::order::OrderStore;
use custos_types::OrderId;

/// Enforces order invariants in front of the byte-oriented store: unique
/// ids, immutable bindings (type, symbol, CU), monotonic status.
pub struct OrderKeeper<'a, S: OrderStore> {
    store: &'a S,
}

impl<'a, S: OrderStore> OrderKeeper<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn encode(order: &Order) -> Result<Vec<u8>, OrderError> {
        serde_json::to_vec(order).map_err(|e| OrderError::Codec(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Order, OrderError> {
        serde_json::from_slice(bytes).map_err(|e| OrderError::Codec(e.to_string()))
    }

    /// Persist a freshly created order. The id must be unused.
    pub fn new_order(&self, order: &Order) -> Result<(), OrderError> {
        let id = order.id();
        if self.store.exists(&id)? {
            return Err(OrderError::Duplicate(id.to_string()));
        }
        self.store.put_order(&id, &Self::encode(order)?)?;
        Ok(())
    }

    pub fn get(&self, id: &OrderId) -> Result<Order, OrderError> {
        if !self.store.exists(id)? {
            return Err(OrderError::NotFound(id.to_string()));
        }
        Self::decode(&self.store.get_order(id)?)
    }

    pub fn exists(&self, id: &OrderId) -> Result<bool, OrderError> {
        Ok(self.store.exists(id)?)
    }

    /// Overwrite an existing order. The stored order must carry the same
    /// type, symbol, and CU binding — an id can never be rebound.
    pub fn set_order(&self, order: &Order) -> Result<(), OrderError> {
        let id = order.id();
        let stored = self.get(&id)?;
        if stored.order_type() != order.order_type() {
            return Err(OrderError::TypeMismatch {
                id: id.to_string(),
                expected: stored.order_type().to_string(),
                found: order.order_type().to_string(),
            });
        }
        if stored.base().symbol != order.base().symbol {
            return Err(OrderError::BindingMismatch {
                id: id.to_string(),
                field: "symbol".into(),
            });
        }
        if stored.base().cu_address != order.base().cu_address {
            return Err(OrderError::BindingMismatch {
                id: id.to_string(),
                field: "cu_address".into(),
            });
        }
        self.store.put_order(&id, &Self::encode(order)?)?;
        Ok(())
    }

    /// Advance an order one step along the status chain and persist it.
    pub fn advance(&self, order: &mut Order, to: OrderStatus) -> Result<(), OrderError> {
        let from = order.status();
        if !from.can_advance_to(to) {
            return Err(OrderError::InvalidTransition {
                id: order.id().to_string(),
                from,
                to,
            });
        }
        order.base_mut().status = to;
        self.set_order(order)
    }

    /// Roll a stuck order back to `Begin` (OrderRetry recovery).
    ///
    /// Only in-flight orders can be reset; `Begin` and `Finish` are left
    /// untouched.
    pub fn reset_to_begin(&self, order: &mut Order) -> Result<(), OrderError> {
        match order.status() {
            OrderStatus::WaitSign | OrderStatus::SignFinish => {
                order.base_mut().status = OrderStatus::Begin;
                self.set_order(order)
            }
            from => Err(OrderError::InvalidTransition {
                id: order.id().to_string(),
                from,
                to: OrderStatus::Begin,
            }),
        }
    }

    /// Require an order to be in `expected` status.
    pub fn expect_status(order: &Order, expected: OrderStatus) -> Result<(), OrderError> {
        if order.status() != expected {
            return Err(OrderError::UnexpectedStatus {
                id: order.id().to_string(),
                expected,
                found: order.status(),
            });
        }
        Ok(())
    }

    /// All stored order ids.
    pub fn order_ids(&self) -> Result<Vec<OrderId>, OrderError> {
        Ok(self.store.order_ids()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CollectOrder, OrderBase, WithdrawalOrder};
    use custos_nullables::NullStore;
    use custos_types::{Amount, CuAddress, ExtAddress, Symbol};

    fn collect(id: OrderId, cu: &str, symbol: &str) -> Order {
        Order::Collect(CollectOrder::new(
            OrderBase::new(
                id,
                CuAddress::new(format!("cu_{cu}")).unwrap(),
                Symbol::new(symbol).unwrap(),
                1,
            ),
            CuAddress::new(format!("cu_{cu}")).unwrap(),
            ExtAddress::new("maddr"),
            "hash".into(),
            0,
            Amount::new(100_000),
            String::new(),
        ))
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = NullStore::new();
        let keeper = OrderKeeper::new(&store);
        let id = OrderId::random();
        keeper.new_order(&collect(id, "alice", "btc")).unwrap();
        assert!(matches!(
            keeper.new_order(&collect(id, "alice", "btc")),
            Err(OrderError::Duplicate(_))
        ));
    }

    #[test]
    fn id_cannot_be_rebound() {
        let store = NullStore::new();
        let keeper = OrderKeeper::new(&store);
        let id = OrderId::random();
        keeper.new_order(&collect(id, "alice", "btc")).unwrap();

        // Different type under the same id.
        let withdrawal = Order::Withdrawal(WithdrawalOrder::new(
            OrderBase::new(
                id,
                CuAddress::new("cu_alice").unwrap(),
                Symbol::new("btc").unwrap(),
                1,
            ),
            ExtAddress::new("dest"),
            Amount::new(1),
            Amount::new(1),
        ));
        assert!(matches!(
            keeper.set_order(&withdrawal),
            Err(OrderError::TypeMismatch { .. })
        ));

        // Different symbol under the same id.
        assert!(matches!(
            keeper.set_order(&collect(id, "alice", "eth")),
            Err(OrderError::BindingMismatch { .. })
        ));

        // Different CU under the same id.
        assert!(matches!(
            keeper.set_order(&collect(id, "bob", "btc")),
            Err(OrderError::BindingMismatch { .. })
        ));
    }

    #[test]
    fn advance_walks_the_chain() {
        let store = NullStore::new();
        let keeper = OrderKeeper::new(&store);
        let id = OrderId::random();
        let mut order = collect(id, "alice", "btc");
        keeper.new_order(&order).unwrap();

        keeper.advance(&mut order, OrderStatus::WaitSign).unwrap();
        keeper.advance(&mut order, OrderStatus::SignFinish).unwrap();
        keeper.advance(&mut order, OrderStatus::Finish).unwrap();
        assert_eq!(keeper.get(&id).unwrap().status(), OrderStatus::Finish);
    }

    #[test]
    fn advance_rejects_skips_and_regressions() {
        let store = NullStore::new();
        let keeper = OrderKeeper::new(&store);
        let mut order = collect(OrderId::random(), "alice", "btc");
        keeper.new_order(&order).unwrap();

        assert!(matches!(
            keeper.advance(&mut order, OrderStatus::Finish),
            Err(OrderError::InvalidTransition { .. })
        ));
        keeper.advance(&mut order, OrderStatus::WaitSign).unwrap();
        assert!(matches!(
            keeper.advance(&mut order, OrderStatus::Begin),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reset_only_from_in_flight_states() {
        let store = NullStore::new();
        let keeper = OrderKeeper::new(&store);
        let mut order = collect(OrderId::random(), "alice", "btc");
        keeper.new_order(&order).unwrap();

        // Begin: nothing to reset.
        assert!(keeper.reset_to_begin(&mut order).is_err());

        keeper.advance(&mut order, OrderStatus::WaitSign).unwrap();
        keeper.reset_to_begin(&mut order).unwrap();
        assert_eq!(order.status(), OrderStatus::Begin);

        // Finish is terminal.
        keeper.advance(&mut order, OrderStatus::WaitSign).unwrap();
        keeper.advance(&mut order, OrderStatus::SignFinish).unwrap();
        keeper.advance(&mut order, OrderStatus::Finish).unwrap();
        assert!(keeper.reset_to_begin(&mut order).is_err());
    }
}
