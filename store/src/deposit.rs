//! Deposit item storage trait.

use crate::StoreError;
use custos_types::{Amount, CuAddress, DepositStatus, ExtAddress, Symbol};
use serde::{Deserialize, Serialize};

/// One observed foreign-chain inflow, keyed by
/// `(symbol, cu_address, tx_hash, index)`.
///
/// For UTXO chains an item doubles as a spendable input once `Confirmed`;
/// items are deleted when a settlement consumes them, and change-back mints
/// fresh `Confirmed` items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositItem {
    pub symbol: Symbol,
    pub cu_address: CuAddress,
    pub tx_hash: String,
    pub index: u64,
    pub amount: Amount,
    /// The foreign address the funds sit on.
    pub ext_address: ExtAddress,
    pub memo: String,
    pub status: DepositStatus,
}

impl DepositItem {
    /// The `(tx_hash, index)` outpoint identifying this item on-chain.
    pub fn outpoint(&self) -> (&str, u64) {
        (&self.tx_hash, self.index)
    }
}

/// Trait for deposit item storage.
///
/// `list_items` returns the deposit list of a `(symbol, cu)` pair in
/// insertion order — the iteration order every validator must agree on.
pub trait DepositStore {
    fn put_item(&self, item: &DepositItem) -> Result<(), StoreError>;

    fn get_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<DepositItem, StoreError>;

    fn exists(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<bool, StoreError>;

    /// Delete an item once fully consumed by settlement.
    fn delete_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<(), StoreError>;

    fn list_items(&self, symbol: &Symbol, cu: &CuAddress)
        -> Result<Vec<DepositItem>, StoreError>;
}
