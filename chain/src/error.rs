use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to decode transaction data: {0}")]
    DecodeFailed(String),

    #[error("invalid address {address} for chain {chain}")]
    InvalidAddress { chain: String, address: String },

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("chain adapter unavailable: {0}")]
    Unavailable(String),
}
