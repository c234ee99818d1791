//! Deposit item operations.

use crate::error::LedgerError;
use crate::ledger::AssetLedger;
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::{DepositItem, DepositStore};
use custos_types::{CuAddress, DepositStatus, Symbol};

impl<C, A, D> AssetLedger<'_, C, A, D>
where
    C: CuStore,
    A: AssetStore,
    D: DepositStore,
{
    /// Record a newly observed inflow. Duplicate `(tx_hash, index)` for the
    /// same symbol and CU is rejected — each outpoint is credited once.
    pub fn new_deposit_item(&self, item: DepositItem) -> Result<(), LedgerError> {
        if self
            .deposits
            .exists(&item.symbol, &item.cu_address, &item.tx_hash, item.index)?
        {
            return Err(LedgerError::DuplicateDeposit {
                tx_hash: item.tx_hash,
                index: item.index,
            });
        }
        self.deposits.put_item(&item)?;
        Ok(())
    }

    pub fn get_deposit_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<DepositItem, LedgerError> {
        if !self.deposits.exists(symbol, cu, tx_hash, index)? {
            return Err(LedgerError::DepositNotFound {
                tx_hash: tx_hash.to_string(),
                index,
            });
        }
        Ok(self.deposits.get_item(symbol, cu, tx_hash, index)?)
    }

    pub fn set_deposit_status(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
        status: DepositStatus,
    ) -> Result<(), LedgerError> {
        let mut item = self.get_deposit_item(symbol, cu, tx_hash, index)?;
        item.status = status;
        self.deposits.put_item(&item)?;
        Ok(())
    }

    /// Remove an item fully consumed by settlement.
    pub fn consume_deposit_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<(), LedgerError> {
        let _ = self.get_deposit_item(symbol, cu, tx_hash, index)?;
        self.deposits.delete_item(symbol, cu, tx_hash, index)?;
        Ok(())
    }

    /// The deposit list of a `(symbol, cu)` pair filtered by status, in
    /// insertion order.
    pub fn deposit_items_by_status(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        status: DepositStatus,
    ) -> Result<Vec<DepositItem>, LedgerError> {
        Ok(self
            .deposits
            .list_items(symbol, cu)?
            .into_iter()
            .filter(|i| i.status == status)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_nullables::NullStore;
    use custos_types::{Amount, ExtAddress};

    fn item(hash: &str, index: u64, status: DepositStatus) -> DepositItem {
        DepositItem {
            symbol: Symbol::new("btc").unwrap(),
            cu_address: CuAddress::new("cu_alice").unwrap(),
            tx_hash: hash.to_string(),
            index,
            amount: Amount::new(50_000),
            ext_address: ExtAddress::new("bc1qalice"),
            memo: String::new(),
            status,
        }
    }

    #[test]
    fn duplicate_outpoint_rejected() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);

        ledger
            .new_deposit_item(item("aa", 0, DepositStatus::UnCollected))
            .unwrap();
        assert!(matches!(
            ledger.new_deposit_item(item("aa", 0, DepositStatus::UnCollected)),
            Err(LedgerError::DuplicateDeposit { .. })
        ));
        // Same hash, different index is a distinct outpoint.
        ledger
            .new_deposit_item(item("aa", 1, DepositStatus::UnCollected))
            .unwrap();
    }

    #[test]
    fn status_filter_preserves_insertion_order() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let sym = Symbol::new("btc").unwrap();
        let cu = CuAddress::new("cu_alice").unwrap();

        ledger
            .new_deposit_item(item("aa", 0, DepositStatus::WaitCollect))
            .unwrap();
        ledger
            .new_deposit_item(item("bb", 0, DepositStatus::Confirmed))
            .unwrap();
        ledger
            .new_deposit_item(item("cc", 0, DepositStatus::WaitCollect))
            .unwrap();

        let waiting = ledger
            .deposit_items_by_status(&sym, &cu, DepositStatus::WaitCollect)
            .unwrap();
        let hashes: Vec<&str> = waiting.iter().map(|i| i.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["aa", "cc"]);
    }

    #[test]
    fn consume_removes_item() {
        let store = NullStore::new();
        let ledger = AssetLedger::new(&store, &store, &store);
        let sym = Symbol::new("btc").unwrap();
        let cu = CuAddress::new("cu_alice").unwrap();

        ledger
            .new_deposit_item(item("aa", 0, DepositStatus::Confirmed))
            .unwrap();
        ledger.consume_deposit_item(&sym, &cu, "aa", 0).unwrap();
        assert!(matches!(
            ledger.get_deposit_item(&sym, &cu, "aa", 0),
            Err(LedgerError::DepositNotFound { .. })
        ));
    }
}
