//! Token configuration lookup seam.

use crate::error::ChainError;
use custos_types::{Symbol, TokenInfo};

/// Read-only token configuration, owned by an external module.
pub trait TokenRegistry {
    /// Look up a token's static parameters.
    ///
    /// Unknown symbols fail with [`ChainError::UnsupportedToken`].
    fn get_token(&self, symbol: &Symbol) -> Result<TokenInfo, ChainError>;
}
