use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuorumError {
    #[error("{0} is not a current validator operator")]
    NotValidator(String),

    #[error("tally codec error: {0}")]
    Codec(String),

    #[error("storage error: {0}")]
    Storage(#[from] custos_store::StoreError),
}
