//! Typed settlement orders.
//!
//! An order is the durable record of one cross-chain settlement intent and
//! its progress. Orders are a closed sum type keyed by the `order_type`
//! serde tag — deserialization dispatches on the tag, never on an open
//! registry — and advance through the monotonic status chain
//! `Begin → WaitSign → SignFinish → Finish`.

pub mod error;
pub mod keeper;
pub mod order;
pub mod status;

pub use error::OrderError;
pub use keeper::OrderKeeper;
pub use order::{
    CollectOrder, KeyGenOrder, OpcuAssetTransferOrder, Order, OrderBase, OutPoint,
    SysTransferOrder, TransferItem, WithdrawalOrder,
};
pub use status::{DepositConfirmStatus, OrderStatus, OrderType};
