//! Epoch rotation and pruning of historical asset addresses.

use crate::error::LedgerError;
use crate::ledger::AssetLedger;
use custos_store::asset::{AssetAddress, AssetStore};
use custos_store::cu::CuStore;
use custos_store::deposit::DepositStore;
use custos_types::{Amount, Chain, CuAddress, Epoch, ExtAddress, MigrationStatus};

/// Historical entries older than this many epochs are pruned.
pub const EPOCH_RETENTION: u64 = 2;

impl<C, A, D> AssetLedger<'_, C, A, D>
where
    C: CuStore,
    A: AssetStore,
    D: DepositStore,
{
    /// Rotate an OPCU's signing address on `chain` into `new_epoch`.
    ///
    /// The current entry is stamped as retired in `new_epoch` and a fresh
    /// current entry is installed for the new address. Key material for the
    /// new epoch is recorded and migration enters `Begin`.
    pub fn rotate_epoch(
        &self,
        cu: &CuAddress,
        chain: &Chain,
        new_address: ExtAddress,
        new_pubkey: Vec<u8>,
        new_epoch: Epoch,
    ) -> Result<(), LedgerError> {
        let mut asset = self.get_asset(cu)?;

        let current = asset
            .current_address_mut(chain)
            .ok_or_else(|| LedgerError::NoAssetAddress(chain.to_string()))?;
        current.epoch = Some(new_epoch);
        current.enable_send_tx = false;

        let mut entry = AssetAddress::new(chain.clone(), new_address);
        entry.enable_send_tx = true;
        asset.assets.push(entry);

        asset.asset_pubkey = new_pubkey;
        asset.asset_pubkey_epoch = new_epoch;
        asset.migration_status = MigrationStatus::Begin;
        self.assets.put_asset(&asset)?;
        Ok(())
    }

    /// Prune historical entries more than [`EPOCH_RETENTION`] epochs old,
    /// folding any unused `gas_remained` into the chain's `gas_used`.
    pub fn prune_stale_epochs(
        &self,
        cu: &CuAddress,
        current_epoch: Epoch,
    ) -> Result<usize, LedgerError> {
        let mut asset = self.get_asset(cu)?;

        let stale: Vec<usize> = asset
            .assets
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                a.epoch
                    .is_some_and(|e| e.is_stale(current_epoch, EPOCH_RETENTION))
            })
            .map(|(i, _)| i)
            .collect();

        for &i in stale.iter().rev() {
            let entry = asset.assets.remove(i);
            if !entry.gas_remained.is_zero() {
                let total = asset
                    .gas_used
                    .get(&entry.chain)
                    .copied()
                    .unwrap_or(Amount::ZERO);
                let folded = total
                    .checked_add(entry.gas_remained)
                    .ok_or(LedgerError::Overflow)?;
                asset.gas_used.insert(entry.chain.clone(), folded);
            }
        }

        let pruned = stale.len();
        if pruned > 0 {
            self.assets.put_asset(&asset)?;
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_nullables::NullStore;

    fn setup<'a>(store: &'a NullStore) -> (AssetLedger<'a, NullStore, NullStore, NullStore>, CuAddress, Chain) {
        let ledger = AssetLedger::new(store, store, store);
        let opcu = CuAddress::new("cu_opbtc").unwrap();
        let chain = Chain::new("btc");
        ledger
            .register_asset_address(&opcu, &chain, ExtAddress::new("addr-e0"))
            .unwrap();
        (ledger, opcu, chain)
    }

    #[test]
    fn rotation_retires_current_and_installs_new() {
        let store = NullStore::new();
        let (ledger, opcu, chain) = setup(&store);

        ledger
            .rotate_epoch(&opcu, &chain, ExtAddress::new("addr-e1"), vec![1], Epoch::new(1))
            .unwrap();

        let asset = ledger.get_asset(&opcu).unwrap();
        assert_eq!(asset.assets.len(), 2);
        let current = asset.current_address(&chain).unwrap();
        assert_eq!(current.address.as_str(), "addr-e1");
        let retired = asset.address_at_epoch(&chain, Epoch::new(1)).unwrap();
        assert_eq!(retired.address.as_str(), "addr-e0");
        assert!(!retired.enable_send_tx);
        assert_eq!(asset.migration_status, MigrationStatus::Begin);
        assert_eq!(asset.asset_pubkey_epoch, Epoch::new(1));
    }

    #[test]
    fn pruning_folds_gas_into_used() {
        let store = NullStore::new();
        let (ledger, opcu, chain) = setup(&store);

        // Leave some gas on the epoch-0 address, then rotate far ahead.
        ledger
            .add_gas_remained(&opcu, &chain, &ExtAddress::new("addr-e0"), Amount::new(77))
            .unwrap();
        ledger
            .rotate_epoch(&opcu, &chain, ExtAddress::new("addr-e1"), vec![1], Epoch::new(1))
            .unwrap();

        // At epoch 3 the entry retired in epoch 1 is exactly at the window
        // edge and survives; at epoch 4 it is stale.
        assert_eq!(ledger.prune_stale_epochs(&opcu, Epoch::new(3)).unwrap(), 0);
        assert_eq!(ledger.prune_stale_epochs(&opcu, Epoch::new(4)).unwrap(), 1);

        let asset = ledger.get_asset(&opcu).unwrap();
        assert_eq!(asset.assets.len(), 1);
        assert_eq!(asset.gas_used.get(&chain), Some(&Amount::new(77)));
    }
}
