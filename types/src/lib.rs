//! Fundamental types for the custos settlement engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: custodian-unit and foreign-chain addresses, amounts, symbols,
//! epochs, order/validator identifiers, and static token parameters.

pub mod address;
pub mod amount;
pub mod epoch;
pub mod error;
pub mod id;
pub mod state;
pub mod symbol;
pub mod token;

pub use address::{CuAddress, ExtAddress};
pub use amount::{Amount, BPS_DENOMINATOR};
pub use epoch::Epoch;
pub use error::TypeError;
pub use id::{OrderId, ValidatorId};
pub use state::{CuKind, DepositStatus, MigrationStatus};
pub use symbol::{Chain, Symbol};
pub use token::{TokenInfo, TxModel};
