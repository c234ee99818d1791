//! Flow receipts.
//!
//! Every mutating entry point returns a [`Receipt`]: the ordered list of
//! observable effects the call produced. Callers (event indexers, the
//! embedding node) read flows instead of diffing store state. An idempotent
//! no-op confirmation returns an empty receipt.

use custos_orders::{OrderStatus, OrderType};
use custos_types::{Amount, CuAddress, ExtAddress, OrderId, Symbol};
use serde::{Deserialize, Serialize};

/// An order changed status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFlow {
    pub cu: CuAddress,
    pub order_id: OrderId,
    pub order_type: OrderType,
    pub status: OrderStatus,
}

/// A CU balance or hold moved. Changes are signed raw units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceFlow {
    pub cu: CuAddress,
    pub symbol: Symbol,
    pub previous_balance: Amount,
    pub balance_change: i128,
    pub previous_hold: Amount,
    pub hold_change: i128,
}

/// A batch of deposit orders crossed quorum together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositConfirmedFlow {
    /// Orders credited as real inflows.
    pub order_ids: Vec<OrderId>,
    /// Orders rejected as claims with no matching on-chain transaction.
    pub invalid_order_ids: Vec<OrderId>,
}

/// A consolidation settled on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFlow {
    pub opcu: CuAddress,
    pub symbol: Symbol,
    pub total_amount: Amount,
    pub cost_fee: Amount,
}

/// A withdrawal settled on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalFlow {
    pub cu: CuAddress,
    pub symbol: Symbol,
    pub to_address: ExtAddress,
    pub amount: Amount,
    pub gas_fee: Amount,
}

/// A gas top-up settled on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysTransferFlow {
    pub opcu: CuAddress,
    pub to_cu: CuAddress,
    pub symbol: Symbol,
    pub amount: Amount,
}

/// An epoch migration settled on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpcuAssetTransferFlow {
    pub opcu: CuAddress,
    pub symbol: Symbol,
    pub to_address: ExtAddress,
    pub total_amount: Amount,
    pub cost_fee: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flow {
    Order(OrderFlow),
    Balance(BalanceFlow),
    DepositConfirmed(DepositConfirmedFlow),
    Collect(CollectFlow),
    Withdrawal(WithdrawalFlow),
    SysTransfer(SysTransferFlow),
    OpcuAssetTransfer(OpcuAssetTransferFlow),
}

/// Ordered effects of one settlement call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub flows: Vec<Flow>,
}

impl Receipt {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn push(&mut self, flow: Flow) {
        self.flows.push(flow);
    }

    pub fn order_flows(&self) -> impl Iterator<Item = &OrderFlow> {
        self.flows.iter().filter_map(|f| match f {
            Flow::Order(o) => Some(o),
            _ => None,
        })
    }

    pub fn balance_flows(&self) -> impl Iterator<Item = &BalanceFlow> {
        self.flows.iter().filter_map(|f| match f {
            Flow::Balance(b) => Some(b),
            _ => None,
        })
    }

    pub fn deposit_confirmed_flows(&self) -> impl Iterator<Item = &DepositConfirmedFlow> {
        self.flows.iter().filter_map(|f| match f {
            Flow::DepositConfirmed(d) => Some(d),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_filters_by_flow_kind() {
        let mut receipt = Receipt::empty();
        assert!(receipt.is_empty());

        receipt.push(Flow::DepositConfirmed(DepositConfirmedFlow {
            order_ids: vec![OrderId::random()],
            invalid_order_ids: Vec::new(),
        }));
        receipt.push(Flow::Balance(BalanceFlow {
            cu: CuAddress::new("cu_alice").unwrap(),
            symbol: Symbol::new("eth").unwrap(),
            previous_balance: Amount::ZERO,
            balance_change: 3,
            previous_hold: Amount::ZERO,
            hold_change: 0,
        }));

        assert_eq!(receipt.deposit_confirmed_flows().count(), 1);
        assert_eq!(receipt.balance_flows().count(), 1);
        assert_eq!(receipt.order_flows().count(), 0);
    }
}
