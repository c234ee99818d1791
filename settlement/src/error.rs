use custos_chain::ChainError;
use custos_ledger::LedgerError;
use custos_orders::OrderError;
use custos_quorum::QuorumError;
use custos_store::StoreError;
use custos_verify::VerifyError;
use thiserror::Error;

/// Failure taxonomy of the settlement entry points.
///
/// Every failure is local and non-fatal: nothing is partially applied, and
/// adapter decode/verify failures leave order status untouched.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order not found: {0}")]
    NotFoundOrder(String),

    #[error("unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("transaction not enabled: {0}")]
    TransactionNotEnabled(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction: {0}")]
    InvalidTx(String),

    #[error("insufficient coins: needed {needed}, available {available}")]
    InsufficientCoins { needed: u128, available: u128 },

    #[error("insufficient fee: needed {needed}, provided {provided}")]
    InsufficientFee { needed: u128, provided: u128 },

    #[error("amount error: {0}")]
    AmountError(String),

    #[error("unknown utxo {tx_hash}:{index}")]
    UnknownUtxo { tx_hash: String, index: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ChainError> for SettlementError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::InvalidAddress { .. } => SettlementError::InvalidAddress(e.to_string()),
            ChainError::UnsupportedToken(sym) => SettlementError::UnsupportedToken(sym),
            other => SettlementError::InvalidTx(other.to_string()),
        }
    }
}

impl From<VerifyError> for SettlementError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::UnknownUtxo { tx_hash, index } => {
                SettlementError::UnknownUtxo { tx_hash, index }
            }
            VerifyError::InsufficientCoins { needed, available } => {
                SettlementError::InsufficientCoins { needed, available }
            }
            VerifyError::BelowThreshold { .. } => SettlementError::AmountError(e.to_string()),
            other => SettlementError::InvalidTx(other.to_string()),
        }
    }
}
