//! Foreign-transaction verification engines.
//!
//! These are pure, fail-fast validation pipelines: given the pending orders
//! for one OPCU and symbol plus a decoded transaction, they either return
//! the aggregate the orchestrator needs to mutate the ledger, or the one
//! specific error describing the first check that failed. No store access
//! and no floating point — everything here runs identically on every
//! validator.

pub mod account;
pub mod error;
pub mod gas;
pub mod utxo;

pub use account::{verify_account_tx, ExpectedAccountTx};
pub use error::VerifyError;
pub use gas::{check_gas_price_band, check_gas_price_value};
pub use utxo::{verify_utxo_tx, ExpectedPayout, UtxoVerification, UtxoVerifyContext};
