//! Custodian unit storage trait.

use crate::StoreError;
use custos_types::{Amount, CuAddress, CuKind};
use serde::{Deserialize, Serialize};

/// The persisted record of one custodian unit: its kind and native-chain
/// coin balance plus the amount currently held for in-flight settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuInfo {
    pub address: CuAddress,
    /// Set-once: a CU never changes kind after creation.
    pub kind: CuKind,
    pub coins: Amount,
    pub coins_hold: Amount,
}

impl CuInfo {
    pub fn new(address: CuAddress, kind: CuKind) -> Self {
        Self {
            address,
            kind,
            coins: Amount::ZERO,
            coins_hold: Amount::ZERO,
        }
    }

    /// Balance not locked by a hold.
    pub fn available(&self) -> Amount {
        self.coins.saturating_sub(self.coins_hold)
    }
}

/// Trait for custodian unit storage.
pub trait CuStore {
    fn get_cu(&self, address: &CuAddress) -> Result<CuInfo, StoreError>;

    fn put_cu(&self, info: &CuInfo) -> Result<(), StoreError>;

    fn exists(&self, address: &CuAddress) -> Result<bool, StoreError>;

    fn cu_count(&self) -> Result<u64, StoreError>;
}
