use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("duplicate order id: {0}")]
    Duplicate(String),

    #[error("order {id} is bound to a different {field}")]
    BindingMismatch { id: String, field: String },

    #[error("order {id}: expected type {expected}, found {found}")]
    TypeMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("order {id}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: crate::status::OrderStatus,
        to: crate::status::OrderStatus,
    },

    #[error("order {id}: expected status {expected:?}, found {found:?}")]
    UnexpectedStatus {
        id: String,
        expected: crate::status::OrderStatus,
        found: crate::status::OrderStatus,
    },

    #[error("order codec error: {0}")]
    Codec(String),

    #[error("storage error: {0}")]
    Storage(#[from] custos_store::StoreError),
}
