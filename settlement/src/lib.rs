//! The settlement engine.
//!
//! Every balance-bearing mutation of the custodial ledger flows through an
//! order and, for the irreversible steps, through a two-thirds validator
//! confirmation. The [`SettlementKeeper`] is the single entry surface: it
//! is rebuilt per block over borrowed store, chain adapter, token registry,
//! and evidence collaborators, and every call returns a [`Receipt`] of the
//! observable effects it produced.
//!
//! Workflows:
//! - deposit intake and quorum-gated confirmation (`deposit`,
//!   `confirmed_deposit`)
//! - consolidation of confirmed deposits into an OPCU (`collect_*`)
//! - outbound user withdrawals funded by an OPCU (`withdrawal*`)
//! - native-gas top-ups between CUs (`sys_transfer*`)
//! - epoch key-rotation migration of OPCU holdings
//!   (`opcu_asset_transfer*`, `after_new_epoch`)
//! - quorum-gated rollback of stuck orders (`order_retry`)

pub mod error;
pub mod flows;
pub mod keeper;

mod collect;
mod deposit;
mod opcu_transfer;
mod retry;
mod systransfer;
mod withdrawal;

pub use error::SettlementError;
pub use flows::{
    BalanceFlow, CollectFlow, DepositConfirmedFlow, Flow, OpcuAssetTransferFlow, OrderFlow,
    Receipt, SysTransferFlow, WithdrawalFlow,
};
pub use keeper::SettlementKeeper;
pub use systransfer::MAX_SYS_TRANSFER_NUM;
