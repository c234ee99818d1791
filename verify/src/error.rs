use thiserror::Error;

/// One variant per verification failure, surfaced to callers as the reason
/// a transaction was rejected at `WaitSign`/`SignFinish`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("unknown utxo {tx_hash}:{index}")]
    UnknownUtxo { tx_hash: String, index: u64 },

    #[error("utxo {tx_hash}:{index} is not spendable in its current status")]
    UtxoNotSpendable { tx_hash: String, index: u64 },

    #[error("vin set does not match the declared set: {0}")]
    VinMismatch(String),

    #[error("transaction amounts overflow")]
    AmountOverflow,

    #[error("fee mismatch: vins {vin_total} - vouts {vout_total} != cost fee {cost_fee}")]
    FeeMismatch {
        vin_total: u128,
        vout_total: u128,
        cost_fee: u128,
    },

    #[error("no vout pays order destination {to} amount {amount}")]
    PayoutMismatch { to: String, amount: u128 },

    #[error("collect/changeback to an unexpected address: {0}")]
    UnexpectedVout(String),

    #[error("gas price is too high")]
    GasPriceTooHigh,

    #[error("gas price is too low")]
    GasPriceTooLow,

    #[error("amount {amount} is below the configured threshold {threshold}")]
    BelowThreshold { amount: u128, threshold: u128 },

    #[error("insufficient asset coins: paying out {needed}, holding {available}")]
    InsufficientCoins { needed: u128, available: u128 },

    #[error("account chains settle one order per transaction, got {0}")]
    SingleOrderRequired(usize),

    #[error("destination mismatch: expected {expected}, found {found}")]
    ToMismatch { expected: String, found: String },

    #[error("amount mismatch: expected {expected}, found {found}")]
    AmountMismatch { expected: u128, found: u128 },

    #[error("gas limit mismatch: expected {expected}, found {found}")]
    GasLimitMismatch { expected: u128, found: u128 },

    #[error("nonce mismatch: expected {expected}, found {found}")]
    NonceMismatch { expected: u64, found: u64 },

    #[error("sender mismatch: expected {expected}, found {found}")]
    FromMismatch { expected: String, found: String },

    #[error("contract address mismatch: expected {expected}, found {found}")]
    ContractMismatch { expected: String, found: String },
}
