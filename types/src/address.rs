//! Custodian-unit and foreign-chain address types.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A native-chain custodian unit address, always prefixed with `cu_`.
///
/// Validation runs through `TryFrom<String>`, so wire-decoded addresses
/// pass the same check as constructed ones.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CuAddress(String);

impl CuAddress {
    /// The standard prefix for all custodian unit addresses.
    pub const PREFIX: &'static str = "cu_";

    /// Create a CU address, rejecting strings without a `cu_` prefix or
    /// with nothing after it.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        Self::try_from(raw.into())
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CuAddress {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, TypeError> {
        if !s.starts_with(Self::PREFIX) || s.len() == Self::PREFIX.len() {
            return Err(TypeError::InvalidAddress(s));
        }
        Ok(Self(s))
    }
}

impl From<CuAddress> for String {
    fn from(a: CuAddress) -> String {
        a.0
    }
}

impl fmt::Display for CuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An address on a foreign chain (a multisig deposit address, a withdrawal
/// destination, a contract address).
///
/// Format rules differ per chain, so the string is kept opaque here; the
/// chain adapter owns validation and canonicalization. Equality on the raw
/// form is case-sensitive — use [`ExtAddress::eq_canonical`] when comparing
/// addresses that may differ only in letter case (hex-style chains).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtAddress(String);

impl ExtAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive comparison for chains whose addresses are
    /// case-preserving encodings of the same bytes.
    pub fn eq_canonical(&self, other: &ExtAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExtAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cu_address_accepts_prefixed() {
        let a = CuAddress::new("cu_alice").unwrap();
        assert_eq!(a.as_str(), "cu_alice");
    }

    #[test]
    fn cu_address_rejects_unprefixed_and_bare_prefix() {
        assert!(matches!(
            CuAddress::new("alice"),
            Err(TypeError::InvalidAddress(_))
        ));
        assert!(matches!(
            CuAddress::new("cu_"),
            Err(TypeError::InvalidAddress(_))
        ));
    }

    #[test]
    fn wire_decoded_cu_address_is_validated() {
        let good: Result<CuAddress, _> = serde_json::from_str("\"cu_alice\"");
        assert_eq!(good.unwrap().as_str(), "cu_alice");

        let bad: Result<CuAddress, _> = serde_json::from_str("\"alice\"");
        assert!(bad.is_err());
    }

    #[test]
    fn ext_address_canonical_eq_ignores_case() {
        let a = ExtAddress::new("0xAbCd");
        let b = ExtAddress::new("0xabcd");
        assert_ne!(a, b);
        assert!(a.eq_canonical(&b));
    }
}
