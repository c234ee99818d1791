//! Foreign asset tickers and network identifiers.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A foreign-chain asset ticker (`btc`, `eth`, `usdt`, ...), always
/// lowercase ASCII.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, rejecting empty or non-lowercase-alphanumeric input.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        let s = raw.into();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(TypeError::InvalidSymbol(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A foreign network identifier. Distinct from [`Symbol`]: several tokens
/// (contract assets) can live on one chain, and gas accounting is per chain.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Chain(String);

impl Chain {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_accepts_lowercase_alnum() {
        assert!(Symbol::new("btc").is_ok());
        assert!(Symbol::new("usdt2").is_ok());
    }

    #[test]
    fn symbol_rejects_bad_input() {
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("BTC").is_err());
        assert!(Symbol::new("bt c").is_err());
    }
}
