//! Order status and type tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four-stage order lifecycle. Transitions are monotonic; `Finish` is
/// terminal and calls against a finished order are idempotent successes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Begin,
    WaitSign,
    SignFinish,
    Finish,
}

impl OrderStatus {
    /// Whether advancing `self -> to` respects the monotonic chain.
    /// Only single forward steps are legal.
    pub fn can_advance_to(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Begin, OrderStatus::WaitSign)
                | (OrderStatus::WaitSign, OrderStatus::SignFinish)
                | (OrderStatus::SignFinish, OrderStatus::Finish)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == OrderStatus::Finish
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The closed set of order variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Collect,
    Withdrawal,
    SysTransfer,
    OpcuAssetTransfer,
    KeyGen,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The deposit-confirmation axis a Collect order carries, independent of
/// the four-stage status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositConfirmStatus {
    #[default]
    Unconfirmed,
    Confirmed,
    /// Quorum attested the claimed deposit does not exist on chain.
    Invalid,
}
