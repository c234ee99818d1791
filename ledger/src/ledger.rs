//! The asset ledger — checked balance and hold operations.

use crate::error::LedgerError;
use custos_store::asset::{AssetAddress, AssetStore, CuAsset};
use custos_store::cu::{CuInfo, CuStore};
use custos_store::deposit::DepositStore;
use custos_types::{Amount, Chain, CuAddress, CuKind, Epoch, ExtAddress, MigrationStatus, Symbol};

/// Coordinates checked mutations across the CU, asset, and deposit stores.
///
/// Borrowed store handles are passed in explicitly; the ledger owns no
/// state of its own, so every call site decides which backend it runs
/// against.
pub struct AssetLedger<'a, C, A, D>
where
    C: CuStore,
    A: AssetStore,
    D: DepositStore,
{
    pub(crate) cus: &'a C,
    pub(crate) assets: &'a A,
    pub(crate) deposits: &'a D,
}

impl<'a, C, A, D> AssetLedger<'a, C, A, D>
where
    C: CuStore,
    A: AssetStore,
    D: DepositStore,
{
    pub fn new(cus: &'a C, assets: &'a A, deposits: &'a D) -> Self {
        Self {
            cus,
            assets,
            deposits,
        }
    }

    // ── Custodian units ──────────────────────────────────────────────────

    /// Fetch a CU, creating it lazily with `kind` on first reference.
    ///
    /// An existing CU of a different kind fails: kind is set-once.
    pub fn ensure_cu(&self, address: &CuAddress, kind: CuKind) -> Result<CuInfo, LedgerError> {
        if self.cus.exists(address)? {
            let info = self.cus.get_cu(address)?;
            if info.kind != kind {
                return Err(LedgerError::KindMismatch {
                    address: address.to_string(),
                    expected: format!("{kind:?}"),
                });
            }
            return Ok(info);
        }
        let info = CuInfo::new(address.clone(), kind);
        self.cus.put_cu(&info)?;
        Ok(info)
    }

    pub fn get_cu(&self, address: &CuAddress) -> Result<CuInfo, LedgerError> {
        if !self.cus.exists(address)? {
            return Err(LedgerError::CuNotFound(address.to_string()));
        }
        Ok(self.cus.get_cu(address)?)
    }

    /// Fetch a CU and require a specific kind.
    pub fn get_cu_of_kind(&self, address: &CuAddress, kind: CuKind) -> Result<CuInfo, LedgerError> {
        let info = self.get_cu(address)?;
        if info.kind != kind {
            return Err(LedgerError::KindMismatch {
                address: address.to_string(),
                expected: format!("{kind:?}"),
            });
        }
        Ok(info)
    }

    pub fn add_coins(&self, address: &CuAddress, amount: Amount) -> Result<(), LedgerError> {
        let mut info = self.get_cu(address)?;
        info.coins = info.coins.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.cus.put_cu(&info)?;
        Ok(())
    }

    /// Reserve `amount` of the CU's available (unheld) coins.
    pub fn hold_coins(&self, address: &CuAddress, amount: Amount) -> Result<(), LedgerError> {
        let mut info = self.get_cu(address)?;
        if info.available() < amount {
            return Err(LedgerError::InsufficientCoins {
                needed: amount.raw(),
                available: info.available().raw(),
            });
        }
        info.coins_hold = info
            .coins_hold
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.cus.put_cu(&info)?;
        Ok(())
    }

    /// Release a previously taken hold without touching the balance.
    pub fn release_hold(&self, address: &CuAddress, amount: Amount) -> Result<(), LedgerError> {
        let mut info = self.get_cu(address)?;
        info.coins_hold = info.coins_hold.checked_sub(amount).ok_or_else(|| {
            LedgerError::HoldUnderflow {
                amount: amount.raw(),
                held: info.coins_hold.raw(),
            }
        })?;
        self.cus.put_cu(&info)?;
        Ok(())
    }

    /// Consume a hold: release it and debit the real balance by the same
    /// amount, in one step.
    pub fn settle_hold(&self, address: &CuAddress, amount: Amount) -> Result<(), LedgerError> {
        let mut info = self.get_cu(address)?;
        info.coins_hold = info.coins_hold.checked_sub(amount).ok_or_else(|| {
            LedgerError::HoldUnderflow {
                amount: amount.raw(),
                held: info.coins_hold.raw(),
            }
        })?;
        info.coins = info.coins.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientCoins {
                needed: amount.raw(),
                available: info.coins.raw(),
            }
        })?;
        self.cus.put_cu(&info)?;
        Ok(())
    }

    // ── Foreign asset balances ───────────────────────────────────────────

    /// Fetch a CU's asset record, creating it lazily on first reference.
    pub fn ensure_asset(&self, cu: &CuAddress) -> Result<CuAsset, LedgerError> {
        if self.assets.exists(cu)? {
            return Ok(self.assets.get_asset(cu)?);
        }
        let asset = CuAsset::new(cu.clone());
        self.assets.put_asset(&asset)?;
        Ok(asset)
    }

    pub fn get_asset(&self, cu: &CuAddress) -> Result<CuAsset, LedgerError> {
        if !self.assets.exists(cu)? {
            return Err(LedgerError::CuNotFound(cu.to_string()));
        }
        Ok(self.assets.get_asset(cu)?)
    }

    pub fn add_asset_coins(
        &self,
        cu: &CuAddress,
        symbol: &Symbol,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.ensure_asset(cu)?;
        let balance = asset.coins_of(symbol);
        let new = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        asset.asset_coins.insert(symbol.clone(), new);
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    pub fn sub_asset_coins(
        &self,
        cu: &CuAddress,
        symbol: &Symbol,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let balance = asset.coins_of(symbol);
        let new = balance.checked_sub(amount).ok_or_else(|| {
            LedgerError::InsufficientCoins {
                needed: amount.raw(),
                available: balance.raw(),
            }
        })?;
        asset.asset_coins.insert(symbol.clone(), new);
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Reserve foreign-chain coins for an in-flight settlement.
    ///
    /// Invariant: the total hold never exceeds the settled balance.
    pub fn hold_asset_coins(
        &self,
        cu: &CuAddress,
        symbol: &Symbol,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let balance = asset.coins_of(symbol);
        let held = asset.hold_of(symbol);
        let available = balance.saturating_sub(held);
        if available < amount {
            return Err(LedgerError::InsufficientCoins {
                needed: amount.raw(),
                available: available.raw(),
            });
        }
        let new = held.checked_add(amount).ok_or(LedgerError::Overflow)?;
        asset.asset_coins_hold.insert(symbol.clone(), new);
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    pub fn release_asset_hold(
        &self,
        cu: &CuAddress,
        symbol: &Symbol,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let held = asset.hold_of(symbol);
        let new = held.checked_sub(amount).ok_or_else(|| {
            LedgerError::HoldUnderflow {
                amount: amount.raw(),
                held: held.raw(),
            }
        })?;
        asset.asset_coins_hold.insert(symbol.clone(), new);
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Consume an asset hold: release it and debit the settled balance.
    pub fn settle_asset_hold(
        &self,
        cu: &CuAddress,
        symbol: &Symbol,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.release_asset_hold(cu, symbol, amount)?;
        self.sub_asset_coins(cu, symbol, amount)
    }

    // ── Asset addresses & gas ────────────────────────────────────────────

    /// Register the current foreign address of a CU on a chain.
    ///
    /// Set-once: registering a different address while a current entry
    /// exists fails; re-registering the same address is a no-op.
    pub fn register_asset_address(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        address: ExtAddress,
    ) -> Result<(), LedgerError> {
        let mut asset = self.ensure_asset(cu)?;
        if let Some(current) = asset.current_address(chain) {
            if current.address.eq_canonical(&address) {
                return Ok(());
            }
            return Err(LedgerError::AlreadyAssigned(format!(
                "asset address for chain {chain}"
            )));
        }
        asset.assets.push(AssetAddress::new(chain.clone(), address));
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    pub fn set_send_enabled(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        enabled: bool,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let entry = asset
            .current_address_mut(chain)
            .ok_or_else(|| LedgerError::NoAssetAddress(chain.to_string()))?;
        entry.enable_send_tx = enabled;
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    pub fn add_gas_remained(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        address: &ExtAddress,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let entry = asset
            .assets
            .iter_mut()
            .find(|a| &a.chain == chain && a.address.eq_canonical(address))
            .ok_or_else(|| LedgerError::NoAssetAddress(chain.to_string()))?;
        entry.gas_remained = entry
            .gas_remained
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Record settlement gas: spent gas accumulates into `gas_used`, fee
    /// income collected from users into `gas_received`.
    pub fn record_gas(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        used: Amount,
        received: Amount,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        if !used.is_zero() {
            let total = asset.gas_used.get(chain).copied().unwrap_or(Amount::ZERO);
            asset
                .gas_used
                .insert(chain.clone(), total.checked_add(used).ok_or(LedgerError::Overflow)?);
        }
        if !received.is_zero() {
            let total = asset
                .gas_received
                .get(chain)
                .copied()
                .unwrap_or(Amount::ZERO);
            asset.gas_received.insert(
                chain.clone(),
                total.checked_add(received).ok_or(LedgerError::Overflow)?,
            );
        }
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    pub fn set_migration_status(
        &self,
        cu: &CuAddress,
        status: MigrationStatus,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        asset.migration_status = status;
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Bump the nonce of the current address entry after a broadcast.
    pub fn bump_nonce(&self, cu: &CuAddress, chain: &Chain) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let entry = asset
            .current_address_mut(chain)
            .ok_or_else(|| LedgerError::NoAssetAddress(chain.to_string()))?;
        entry.nonce += 1;
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Bump the nonce of the retired address entry stamped with `epoch`.
    /// Used when an epoch migration broadcasts from the old address.
    pub fn bump_nonce_at_epoch(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        epoch: Epoch,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;
        let entry = asset
            .assets
            .iter_mut()
            .find(|a| &a.chain == chain && a.epoch == Some(epoch))
            .ok_or_else(|| LedgerError::NoAssetAddress(chain.to_string()))?;
        entry.nonce += 1;
        self.assets.put_asset(&asset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_nullables::NullStore;
    use custos_types::Symbol;

    fn addr(s: &str) -> CuAddress {
        CuAddress::new(format!("cu_{s}")).unwrap()
    }

    fn sym() -> Symbol {
        Symbol::new("btc").unwrap()
    }

    #[test]
    fn ensure_cu_is_lazy_and_kind_is_set_once() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let a = addr("alice");

        let info = ledger.ensure_cu(&a, CuKind::User).unwrap();
        assert_eq!(info.coins, Amount::ZERO);

        // Same kind: idempotent.
        ledger.ensure_cu(&a, CuKind::User).unwrap();

        // Different kind: set-once violation.
        assert!(matches!(
            ledger.ensure_cu(&a, CuKind::Op),
            Err(LedgerError::KindMismatch { .. })
        ));
    }

    #[test]
    fn hold_respects_available_balance() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let a = addr("alice");
        ledger.ensure_cu(&a, CuKind::User).unwrap();
        ledger.add_coins(&a, Amount::new(100)).unwrap();

        ledger.hold_coins(&a, Amount::new(60)).unwrap();
        // Only 40 available now.
        assert!(matches!(
            ledger.hold_coins(&a, Amount::new(50)),
            Err(LedgerError::InsufficientCoins { .. })
        ));
        ledger.hold_coins(&a, Amount::new(40)).unwrap();

        let info = ledger.get_cu(&a).unwrap();
        assert_eq!(info.coins_hold, Amount::new(100));
        assert_eq!(info.available(), Amount::ZERO);
    }

    #[test]
    fn settle_hold_debits_exactly_once() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let a = addr("alice");
        ledger.ensure_cu(&a, CuKind::User).unwrap();
        ledger.add_coins(&a, Amount::new(100)).unwrap();
        ledger.hold_coins(&a, Amount::new(30)).unwrap();

        ledger.settle_hold(&a, Amount::new(30)).unwrap();
        let info = ledger.get_cu(&a).unwrap();
        assert_eq!(info.coins, Amount::new(70));
        assert_eq!(info.coins_hold, Amount::ZERO);

        // A second settle of the same hold underflows.
        assert!(matches!(
            ledger.settle_hold(&a, Amount::new(30)),
            Err(LedgerError::HoldUnderflow { .. })
        ));
    }

    #[test]
    fn asset_hold_never_exceeds_balance() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let opcu = addr("opbtc");
        ledger.ensure_cu(&opcu, CuKind::Op).unwrap();
        ledger.add_asset_coins(&opcu, &sym(), Amount::new(500)).unwrap();

        ledger.hold_asset_coins(&opcu, &sym(), Amount::new(500)).unwrap();
        assert!(matches!(
            ledger.hold_asset_coins(&opcu, &sym(), Amount::new(1)),
            Err(LedgerError::InsufficientCoins { .. })
        ));

        let asset = ledger.get_asset(&opcu).unwrap();
        assert_eq!(asset.hold_of(&sym()), Amount::new(500));
        assert!(asset.hold_of(&sym()) <= asset.coins_of(&sym()));
    }

    #[test]
    fn register_asset_address_is_set_once() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let opcu = addr("opbtc");
        let chain = Chain::new("btc");
        ledger
            .register_asset_address(&opcu, &chain, ExtAddress::new("addr1"))
            .unwrap();

        // Same address again: fine.
        ledger
            .register_asset_address(&opcu, &chain, ExtAddress::new("ADDR1"))
            .unwrap();

        // Different address: rejected.
        assert!(matches!(
            ledger.register_asset_address(&opcu, &chain, ExtAddress::new("addr2")),
            Err(LedgerError::AlreadyAssigned(_))
        ));
    }

    #[test]
    fn gas_accounting_accumulates() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let opcu = addr("opeth");
        let chain = Chain::new("eth");
        ledger.ensure_asset(&opcu).unwrap();

        ledger
            .record_gas(&opcu, &chain, Amount::new(10), Amount::new(12))
            .unwrap();
        ledger
            .record_gas(&opcu, &chain, Amount::new(5), Amount::ZERO)
            .unwrap();

        let asset = ledger.get_asset(&opcu).unwrap();
        assert_eq!(asset.gas_used.get(&chain), Some(&Amount::new(15)));
        assert_eq!(asset.gas_received.get(&chain), Some(&Amount::new(12)));
    }

    #[test]
    fn nonce_bumps_target_the_right_entry() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let opcu = addr("opeth");
        let chain = Chain::new("eth");
        ledger
            .register_asset_address(&opcu, &chain, ExtAddress::new("0xold"))
            .unwrap();
        ledger
            .rotate_epoch(&opcu, &chain, ExtAddress::new("0xnew"), vec![1], Epoch::new(1))
            .unwrap();

        // The retired entry and the current one keep independent nonces.
        ledger.bump_nonce_at_epoch(&opcu, &chain, Epoch::new(1)).unwrap();
        ledger.bump_nonce(&opcu, &chain).unwrap();
        ledger.bump_nonce(&opcu, &chain).unwrap();

        let asset = ledger.get_asset(&opcu).unwrap();
        assert_eq!(asset.address_at_epoch(&chain, Epoch::new(1)).unwrap().nonce, 1);
        assert_eq!(asset.current_address(&chain).unwrap().nonce, 2);

        // No entry was retired in epoch 2.
        assert!(matches!(
            ledger.bump_nonce_at_epoch(&opcu, &chain, Epoch::new(2)),
            Err(LedgerError::NoAssetAddress(_))
        ));
    }
}
