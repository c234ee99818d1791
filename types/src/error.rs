//! Shared type-level errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
