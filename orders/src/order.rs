//! The order sum type and its variant payloads.

use crate::status::{DepositConfirmStatus, OrderStatus, OrderType};
use custos_types::{Amount, CuAddress, ExtAddress, OrderId, Symbol};
use serde::{Deserialize, Serialize};

/// Fields common to every order variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBase {
    pub id: OrderId,
    /// The CU this order settles for (the depositing user, the withdrawing
    /// user, the source OPCU).
    pub cu_address: CuAddress,
    pub symbol: Symbol,
    pub status: OrderStatus,
    /// Block height the order was created at.
    pub height: u64,
}

impl OrderBase {
    pub fn new(id: OrderId, cu_address: CuAddress, symbol: Symbol, height: u64) -> Self {
        Self {
            id,
            cu_address,
            symbol,
            status: OrderStatus::Begin,
            height,
        }
    }
}

/// A `(tx_hash, index)` outpoint an order declares it will spend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: String,
    pub index: u64,
}

/// One eligible item of an epoch-migration transfer set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub tx_hash: String,
    pub index: u64,
    pub amount: Amount,
}

/// Deposit evidence plus the consolidation workflow that follows it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOrder {
    pub base: OrderBase,
    /// The proposing CU (the observed sender side of the deposit call).
    pub from_cu: CuAddress,
    /// The multisig address the deposit landed on.
    pub ext_address: ExtAddress,
    pub tx_hash: String,
    pub index: u64,
    pub amount: Amount,
    pub memo: String,
    pub deposit_status: DepositConfirmStatus,

    // ── Consolidation (filled from CollectWaitSign onward) ──────────────
    /// The OPCU the deposits consolidate into.
    pub collect_to: Option<CuAddress>,
    pub raw_data: Vec<u8>,
    pub signed_tx: Vec<u8>,
    /// Hash of the settlement transaction once known.
    pub settle_tx_hash: String,
    /// Declared inputs for UTXO symbols.
    pub vins: Vec<OutPoint>,
    pub cost_fee: Amount,
}

impl CollectOrder {
    pub fn new(
        base: OrderBase,
        from_cu: CuAddress,
        ext_address: ExtAddress,
        tx_hash: String,
        index: u64,
        amount: Amount,
        memo: String,
    ) -> Self {
        Self {
            base,
            from_cu,
            ext_address,
            tx_hash,
            index,
            amount,
            memo,
            deposit_status: DepositConfirmStatus::Unconfirmed,
            collect_to: None,
            raw_data: Vec::new(),
            signed_tx: Vec::new(),
            settle_tx_hash: String::new(),
            vins: Vec::new(),
            cost_fee: Amount::ZERO,
        }
    }
}

/// An outbound user withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOrder {
    pub base: OrderBase,
    pub to_address: ExtAddress,
    pub amount: Amount,
    /// Fee the user pays on top of `amount`; both are held at creation.
    pub gas_fee: Amount,

    /// The OPCU funding the withdrawal (bound at WaitSign).
    pub opcu: Option<CuAddress>,
    pub raw_data: Vec<u8>,
    pub signed_tx: Vec<u8>,
    pub settle_tx_hash: String,
    pub vins: Vec<OutPoint>,
    pub cost_fee: Amount,
}

impl WithdrawalOrder {
    pub fn new(base: OrderBase, to_address: ExtAddress, amount: Amount, gas_fee: Amount) -> Self {
        Self {
            base,
            to_address,
            amount,
            gas_fee,
            opcu: None,
            raw_data: Vec::new(),
            signed_tx: Vec::new(),
            settle_tx_hash: String::new(),
            vins: Vec::new(),
            cost_fee: Amount::ZERO,
        }
    }
}

/// A native-gas top-up from an OPCU to an address that cannot cover its
/// own signing costs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysTransferOrder {
    pub base: OrderBase,
    pub to_cu: CuAddress,
    pub to_address: ExtAddress,
    pub amount: Amount,
    pub raw_data: Vec<u8>,
    pub signed_tx: Vec<u8>,
    pub settle_tx_hash: String,
    pub cost_fee: Amount,
}

/// An epoch key-rotation migration of an OPCU's full holdings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcuAssetTransferOrder {
    pub base: OrderBase,
    /// Current-epoch destination address.
    pub to_address: ExtAddress,
    /// The exact eligible item set being migrated.
    pub items: Vec<TransferItem>,
    pub raw_data: Vec<u8>,
    pub signed_tx: Vec<u8>,
    pub settle_tx_hash: String,
    pub cost_fee: Amount,
}

impl OpcuAssetTransferOrder {
    /// Σ of the migrated item amounts, `None` on overflow.
    pub fn total_amount(&self) -> Option<Amount> {
        Amount::checked_sum(self.items.iter().map(|i| i.amount))
    }
}

/// Output of the upstream key-generation ceremony; carried as an order so
/// its progress shares the audit trail. This engine only stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenOrder {
    pub base: OrderBase,
    pub pubkey: Vec<u8>,
    pub to_address: ExtAddress,
}

/// The closed order sum type, serde-tagged by `order_type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order_type")]
pub enum Order {
    Collect(CollectOrder),
    Withdrawal(WithdrawalOrder),
    SysTransfer(SysTransferOrder),
    OpcuAssetTransfer(OpcuAssetTransferOrder),
    KeyGen(KeyGenOrder),
}

impl Order {
    pub fn base(&self) -> &OrderBase {
        match self {
            Order::Collect(o) => &o.base,
            Order::Withdrawal(o) => &o.base,
            Order::SysTransfer(o) => &o.base,
            Order::OpcuAssetTransfer(o) => &o.base,
            Order::KeyGen(o) => &o.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut OrderBase {
        match self {
            Order::Collect(o) => &mut o.base,
            Order::Withdrawal(o) => &mut o.base,
            Order::SysTransfer(o) => &mut o.base,
            Order::OpcuAssetTransfer(o) => &mut o.base,
            Order::KeyGen(o) => &mut o.base,
        }
    }

    pub fn id(&self) -> OrderId {
        self.base().id
    }

    pub fn status(&self) -> OrderStatus {
        self.base().status
    }

    pub fn order_type(&self) -> OrderType {
        match self {
            Order::Collect(_) => OrderType::Collect,
            Order::Withdrawal(_) => OrderType::Withdrawal,
            Order::SysTransfer(_) => OrderType::SysTransfer,
            Order::OpcuAssetTransfer(_) => OrderType::OpcuAssetTransfer,
            Order::KeyGen(_) => OrderType::KeyGen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_order() -> Order {
        Order::Collect(CollectOrder::new(
            OrderBase::new(
                OrderId::random(),
                CuAddress::new("cu_alice").unwrap(),
                Symbol::new("btc").unwrap(),
                10,
            ),
            CuAddress::new("cu_alice").unwrap(),
            ExtAddress::new("bc1qmultisig"),
            "deadbeef".into(),
            0,
            Amount::new(50_000),
            String::new(),
        ))
    }

    #[test]
    fn tag_dispatch_roundtrip() {
        let order = collect_order();
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"order_type\":\"Collect\""));
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
        assert_eq!(back.order_type(), OrderType::Collect);
    }

    #[test]
    fn new_orders_start_in_begin() {
        let order = collect_order();
        assert_eq!(order.status(), OrderStatus::Begin);
    }

    #[test]
    fn migration_total_sums_items() {
        let order = OpcuAssetTransferOrder {
            base: OrderBase::new(
                OrderId::random(),
                CuAddress::new("cu_opbtc").unwrap(),
                Symbol::new("btc").unwrap(),
                1,
            ),
            to_address: ExtAddress::new("bc1qnew"),
            items: vec![
                TransferItem {
                    tx_hash: "aa".into(),
                    index: 0,
                    amount: Amount::new(30),
                },
                TransferItem {
                    tx_hash: "bb".into(),
                    index: 1,
                    amount: Amount::new(12),
                },
            ],
            raw_data: Vec::new(),
            signed_tx: Vec::new(),
            settle_tx_hash: String::new(),
            cost_fee: Amount::ZERO,
        };
        assert_eq!(order.total_amount(), Some(Amount::new(42)));
    }
}
