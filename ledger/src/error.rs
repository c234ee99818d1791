use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("custodian unit not found: {0}")]
    CuNotFound(String),

    #[error("custodian unit {address} is not a {expected} CU")]
    KindMismatch { address: String, expected: String },

    #[error("insufficient coins: need {needed}, available {available}")]
    InsufficientCoins { needed: u128, available: u128 },

    #[error("hold underflow: releasing {amount} with only {held} held")]
    HoldUnderflow { amount: u128, held: u128 },

    #[error("set-once field already assigned: {0}")]
    AlreadyAssigned(String),

    #[error("duplicate deposit item {tx_hash}:{index}")]
    DuplicateDeposit { tx_hash: String, index: u64 },

    #[error("deposit item not found: {tx_hash}:{index}")]
    DepositNotFound { tx_hash: String, index: u64 },

    #[error("no {0} address registered for chain")]
    NoAssetAddress(String),

    #[error("amount overflow")]
    Overflow,

    #[error("storage error: {0}")]
    Storage(#[from] custos_store::StoreError),
}
