//! Foreign-chain asset storage trait.

use crate::StoreError;
use custos_types::{Amount, Chain, CuAddress, Epoch, ExtAddress, MigrationStatus, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One per-(chain, epoch) signing address entry of a CU.
///
/// At most one entry per chain is *current* (`epoch == None`); historical
/// entries carry the epoch they were retired in and are pruned once more
/// than two epochs old.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAddress {
    pub chain: Chain,
    /// `None` marks the current entry; `Some(e)` an entry retired in epoch `e`.
    pub epoch: Option<Epoch>,
    /// Set-once: never reassigned after first assignment.
    pub address: ExtAddress,
    pub nonce: u64,
    /// Native gas currency left at this address for signing/broadcasting.
    pub gas_remained: Amount,
    pub enable_send_tx: bool,
}

impl AssetAddress {
    pub fn new(chain: Chain, address: ExtAddress) -> Self {
        Self {
            chain,
            epoch: None,
            address,
            nonce: 0,
            gas_remained: Amount::ZERO,
            enable_send_tx: true,
        }
    }

    pub fn is_current(&self) -> bool {
        self.epoch.is_none()
    }
}

/// The persisted foreign-chain asset record of one CU.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuAsset {
    pub cu_address: CuAddress,
    pub assets: Vec<AssetAddress>,
    /// Per-symbol settled foreign balances.
    pub asset_coins: BTreeMap<Symbol, Amount>,
    /// Per-symbol amounts reserved for in-flight settlement. Invariant: a
    /// hold never exceeds the balance it was taken from.
    pub asset_coins_hold: BTreeMap<Symbol, Amount>,
    /// Cumulative per-chain gas spent on settlement transactions.
    pub gas_used: BTreeMap<Chain, Amount>,
    /// Cumulative per-chain gas collected from withdrawal fees.
    pub gas_received: BTreeMap<Chain, Amount>,
    /// Current signing key material reference (opaque to this engine).
    pub asset_pubkey: Vec<u8>,
    pub asset_pubkey_epoch: Epoch,
    pub migration_status: MigrationStatus,
}

impl CuAsset {
    pub fn new(cu_address: CuAddress) -> Self {
        Self {
            cu_address,
            assets: Vec::new(),
            asset_coins: BTreeMap::new(),
            asset_coins_hold: BTreeMap::new(),
            gas_used: BTreeMap::new(),
            gas_received: BTreeMap::new(),
            asset_pubkey: Vec::new(),
            asset_pubkey_epoch: Epoch::ZERO,
            migration_status: MigrationStatus::Finish,
        }
    }

    pub fn coins_of(&self, symbol: &Symbol) -> Amount {
        self.asset_coins.get(symbol).copied().unwrap_or(Amount::ZERO)
    }

    pub fn hold_of(&self, symbol: &Symbol) -> Amount {
        self.asset_coins_hold
            .get(symbol)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// The current (epoch-unset) address entry for a chain, if any.
    pub fn current_address(&self, chain: &Chain) -> Option<&AssetAddress> {
        self.assets.iter().find(|a| &a.chain == chain && a.is_current())
    }

    pub fn current_address_mut(&mut self, chain: &Chain) -> Option<&mut AssetAddress> {
        self.assets
            .iter_mut()
            .find(|a| &a.chain == chain && a.is_current())
    }

    /// The address entry retired in `epoch` for a chain, if any.
    pub fn address_at_epoch(&self, chain: &Chain, epoch: Epoch) -> Option<&AssetAddress> {
        self.assets
            .iter()
            .find(|a| &a.chain == chain && a.epoch == Some(epoch))
    }

    /// Whether `address` belongs to this CU on the given chain, current or
    /// historical, compared case-insensitively.
    pub fn owns_address(&self, chain: &Chain, address: &ExtAddress) -> bool {
        self.assets
            .iter()
            .any(|a| &a.chain == chain && a.address.eq_canonical(address))
    }
}

/// Trait for CU foreign-asset storage.
pub trait AssetStore {
    fn get_asset(&self, cu: &CuAddress) -> Result<CuAsset, StoreError>;

    fn put_asset(&self, asset: &CuAsset) -> Result<(), StoreError>;

    fn exists(&self, cu: &CuAddress) -> Result<bool, StoreError>;
}
