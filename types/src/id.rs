//! Order and validator identifiers.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A settlement order identifier.
///
/// Order ids are caller-supplied UUIDs: the proposer mints the id so that a
/// re-proposal after failure uses a fresh id while every validator derives
/// the same order key from the same call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse an order id from its canonical hyphenated form.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| TypeError::InvalidOrderId(raw.to_string()))
    }

    /// Mint a fresh random id (test fixtures and proposers).
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validator operator identity, as registered in the staking subsystem.
///
/// Confirmation entry points take the caller's operator id explicitly and
/// validate it against the validator-set snapshot passed alongside.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(String);

impl ValidatorId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        let id = OrderId::random();
        let parsed = OrderId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            OrderId::parse("not-a-uuid"),
            Err(TypeError::InvalidOrderId(_))
        ));
    }
}
