//! Nullable store — thread-safe in-memory storage for testing.

use custos_store::asset::{AssetStore, CuAsset};
use custos_store::cu::{CuInfo, CuStore};
use custos_store::deposit::{DepositItem, DepositStore};
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_store::StoreError;
use custos_types::{CuAddress, OrderId, Symbol};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory implementation of every engine store trait.
///
/// Mutexes exist only to satisfy the `&self` trait signatures; the engine
/// itself is single-writer.
pub struct NullStore {
    cus: Mutex<HashMap<String, CuInfo>>,
    assets: Mutex<HashMap<String, CuAsset>>,
    /// Keyed by (symbol, cu, tx_hash, index); insertion order preserved in
    /// the parallel key list so deposit lists iterate deterministically.
    deposits: Mutex<HashMap<(String, String, String, u64), DepositItem>>,
    deposit_order: Mutex<Vec<(String, String, String, u64)>>,
    orders: Mutex<HashMap<OrderId, Vec<u8>>>,
    tallies: Mutex<HashMap<OrderId, Vec<u8>>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            cus: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            deposits: Mutex::new(HashMap::new()),
            deposit_order: Mutex::new(Vec::new()),
            orders: Mutex::new(HashMap::new()),
            tallies: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

fn deposit_key(symbol: &Symbol, cu: &CuAddress, tx_hash: &str, index: u64) -> (String, String, String, u64) {
    (
        symbol.as_str().to_string(),
        cu.as_str().to_string(),
        tx_hash.to_string(),
        index,
    )
}

impl CuStore for NullStore {
    fn get_cu(&self, address: &CuAddress) -> Result<CuInfo, StoreError> {
        self.cus
            .lock()
            .unwrap()
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }

    fn put_cu(&self, info: &CuInfo) -> Result<(), StoreError> {
        self.cus
            .lock()
            .unwrap()
            .insert(info.address.as_str().to_string(), info.clone());
        Ok(())
    }

    fn exists(&self, address: &CuAddress) -> Result<bool, StoreError> {
        Ok(self.cus.lock().unwrap().contains_key(address.as_str()))
    }

    fn cu_count(&self) -> Result<u64, StoreError> {
        Ok(self.cus.lock().unwrap().len() as u64)
    }
}

impl AssetStore for NullStore {
    fn get_asset(&self, cu: &CuAddress) -> Result<CuAsset, StoreError> {
        self.assets
            .lock()
            .unwrap()
            .get(cu.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(cu.to_string()))
    }

    fn put_asset(&self, asset: &CuAsset) -> Result<(), StoreError> {
        self.assets
            .lock()
            .unwrap()
            .insert(asset.cu_address.as_str().to_string(), asset.clone());
        Ok(())
    }

    fn exists(&self, cu: &CuAddress) -> Result<bool, StoreError> {
        Ok(self.assets.lock().unwrap().contains_key(cu.as_str()))
    }
}

impl DepositStore for NullStore {
    fn put_item(&self, item: &DepositItem) -> Result<(), StoreError> {
        let key = deposit_key(&item.symbol, &item.cu_address, &item.tx_hash, item.index);
        let mut deposits = self.deposits.lock().unwrap();
        if !deposits.contains_key(&key) {
            self.deposit_order.lock().unwrap().push(key.clone());
        }
        deposits.insert(key, item.clone());
        Ok(())
    }

    fn get_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<DepositItem, StoreError> {
        self.deposits
            .lock()
            .unwrap()
            .get(&deposit_key(symbol, cu, tx_hash, index))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{tx_hash}:{index}")))
    }

    fn exists(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .contains_key(&deposit_key(symbol, cu, tx_hash, index)))
    }

    fn delete_item(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
        tx_hash: &str,
        index: u64,
    ) -> Result<(), StoreError> {
        let key = deposit_key(symbol, cu, tx_hash, index);
        self.deposits
            .lock()
            .unwrap()
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound(format!("{tx_hash}:{index}")))?;
        self.deposit_order.lock().unwrap().retain(|k| k != &key);
        Ok(())
    }

    fn list_items(
        &self,
        symbol: &Symbol,
        cu: &CuAddress,
    ) -> Result<Vec<DepositItem>, StoreError> {
        let deposits = self.deposits.lock().unwrap();
        let order = self.deposit_order.lock().unwrap();
        Ok(order
            .iter()
            .filter(|(s, c, _, _)| s == symbol.as_str() && c == cu.as_str())
            .filter_map(|k| deposits.get(k).cloned())
            .collect())
    }
}

impl OrderStore for NullStore {
    fn put_order(&self, id: &OrderId, order_bytes: &[u8]) -> Result<(), StoreError> {
        self.orders
            .lock()
            .unwrap()
            .insert(*id, order_bytes.to_vec());
        Ok(())
    }

    fn get_order(&self, id: &OrderId) -> Result<Vec<u8>, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn exists(&self, id: &OrderId) -> Result<bool, StoreError> {
        Ok(self.orders.lock().unwrap().contains_key(id))
    }

    fn delete_order(&self, id: &OrderId) -> Result<(), StoreError> {
        self.orders
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn order_ids(&self) -> Result<Vec<OrderId>, StoreError> {
        let mut ids: Vec<OrderId> = self.orders.lock().unwrap().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

impl VoteStore for NullStore {
    fn get_tally(&self, id: &OrderId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tallies.lock().unwrap().get(id).cloned())
    }

    fn put_tally(&self, id: &OrderId, tally_bytes: &[u8]) -> Result<(), StoreError> {
        self.tallies
            .lock()
            .unwrap()
            .insert(*id, tally_bytes.to_vec());
        Ok(())
    }

    fn delete_tally(&self, id: &OrderId) -> Result<(), StoreError> {
        self.tallies.lock().unwrap().remove(id);
        Ok(())
    }
}
