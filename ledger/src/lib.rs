//! Asset ledger — per-custodian, per-chain balances and their invariants.
//!
//! Every mutation is a checked operation over the abstract store traits:
//! holds never exceed balances, set-once fields are immutable after first
//! assignment, and nothing is partially applied — an operation either
//! completes or returns an error leaving the stores untouched.

pub mod deposit;
pub mod epoch;
pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::AssetLedger;
