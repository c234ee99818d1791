//! Nullable chain adapter and token registry.
//!
//! Decoded transactions are programmed per payload: a test registers the
//! record the adapter should return for a given byte string, mirroring how
//! every validator's real adapter decodes identical bytes identically.

use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_chain::tx::{AccountTransaction, UtxoIn, UtxoTransaction};
use custos_chain::ChainError;
use custos_types::{Chain, ExtAddress, Symbol, TokenInfo};
use std::collections::HashMap;
use std::sync::Mutex;

/// A programmable in-memory chain adapter.
pub struct NullChainAdapter {
    utxo_txs: Mutex<HashMap<Vec<u8>, UtxoTransaction>>,
    account_txs: Mutex<HashMap<Vec<u8>, AccountTransaction>>,
    /// When set, every signature verification fails.
    reject_signatures: Mutex<bool>,
}

impl NullChainAdapter {
    pub fn new() -> Self {
        Self {
            utxo_txs: Mutex::new(HashMap::new()),
            account_txs: Mutex::new(HashMap::new()),
            reject_signatures: Mutex::new(false),
        }
    }

    /// Program the decode result for a raw or signed UTXO payload.
    pub fn put_utxo_tx(&self, payload: impl Into<Vec<u8>>, tx: UtxoTransaction) {
        self.utxo_txs.lock().unwrap().insert(payload.into(), tx);
    }

    /// Program the decode result for a raw or signed account payload.
    pub fn put_account_tx(&self, payload: impl Into<Vec<u8>>, tx: AccountTransaction) {
        self.account_txs.lock().unwrap().insert(payload.into(), tx);
    }

    /// Make all subsequent signature verifications fail.
    pub fn reject_signatures(&self, reject: bool) {
        *self.reject_signatures.lock().unwrap() = reject;
    }

    fn utxo(&self, data: &[u8]) -> Result<UtxoTransaction, ChainError> {
        self.utxo_txs
            .lock()
            .unwrap()
            .get(data)
            .cloned()
            .ok_or_else(|| ChainError::DecodeFailed("unknown utxo payload".into()))
    }

    fn account(&self, data: &[u8]) -> Result<AccountTransaction, ChainError> {
        self.account_txs
            .lock()
            .unwrap()
            .get(data)
            .cloned()
            .ok_or_else(|| ChainError::DecodeFailed("unknown account payload".into()))
    }
}

impl Default for NullChainAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainAdapter for NullChainAdapter {
    /// Accepts any non-empty ASCII address; canonical form is lowercase.
    fn valid_address(
        &self,
        chain: &Chain,
        _symbol: &Symbol,
        address: &str,
    ) -> Result<ExtAddress, ChainError> {
        if address.is_empty() || !address.is_ascii() {
            return Err(ChainError::InvalidAddress {
                chain: chain.to_string(),
                address: address.to_string(),
            });
        }
        Ok(ExtAddress::new(address.to_ascii_lowercase()))
    }

    fn query_utxo_transaction_from_data(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<UtxoTransaction, ChainError> {
        self.utxo(raw_data)
    }

    fn query_utxo_transaction_from_signed_data(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        signed_data: &[u8],
    ) -> Result<UtxoTransaction, ChainError> {
        self.utxo(signed_data)
    }

    fn query_utxo_ins_from_data(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<Vec<UtxoIn>, ChainError> {
        self.utxo(raw_data).map(|tx| tx.vins)
    }

    fn query_account_transaction_from_data(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<AccountTransaction, ChainError> {
        self.account(raw_data)
    }

    fn query_account_transaction_from_signed_data(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        signed_data: &[u8],
    ) -> Result<AccountTransaction, ChainError> {
        self.account(signed_data)
    }

    fn verify_utxo_signed_transaction(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        _input_addresses: &[ExtAddress],
        _signed_data: &[u8],
    ) -> Result<bool, ChainError> {
        Ok(!*self.reject_signatures.lock().unwrap())
    }

    fn verify_account_signed_transaction(
        &self,
        _chain: &Chain,
        _symbol: &Symbol,
        _from: &ExtAddress,
        _signed_data: &[u8],
    ) -> Result<bool, ChainError> {
        Ok(!*self.reject_signatures.lock().unwrap())
    }
}

/// A programmable in-memory token registry.
pub struct NullTokenRegistry {
    tokens: Mutex<HashMap<String, TokenInfo>>,
}

impl NullTokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, token: TokenInfo) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.symbol.as_str().to_string(), token);
    }

    /// Mutate a registered token in place (flip gates, change thresholds).
    pub fn update(&self, symbol: &Symbol, f: impl FnOnce(&mut TokenInfo)) {
        if let Some(token) = self.tokens.lock().unwrap().get_mut(symbol.as_str()) {
            f(token);
        }
    }
}

impl Default for NullTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry for NullTokenRegistry {
    fn get_token(&self, symbol: &Symbol) -> Result<TokenInfo, ChainError> {
        self.tokens
            .lock()
            .unwrap()
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| ChainError::UnsupportedToken(symbol.to_string()))
    }
}
