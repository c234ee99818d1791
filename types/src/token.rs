//! Static token parameters.
//!
//! Token configuration is owned by an external module; the settlement engine
//! consumes it as read-only lookup data through the `TokenRegistry` trait in
//! `custos-chain`. Every threshold and price here is raw integer units.

use crate::address::ExtAddress;
use crate::amount::Amount;
use crate::symbol::{Chain, Symbol};
use serde::{Deserialize, Serialize};

/// Transaction model of the token's home chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxModel {
    /// Vin/vout chains (bitcoin family).
    Utxo,
    /// From/to/nonce chains (ethereum family).
    Account,
}

/// Per-token static configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: Symbol,
    pub chain: Chain,
    pub tx_model: TxModel,

    /// Contract address for contract-based tokens (erc20 style); `None` for
    /// chain-native assets.
    pub contract_address: Option<ExtAddress>,
    pub decimals: u8,

    // ── Feature gates ────────────────────────────────────────────────────
    pub deposit_enabled: bool,
    pub withdrawal_enabled: bool,
    pub send_enabled: bool,

    // ── Thresholds ───────────────────────────────────────────────────────
    /// Minimum amount accepted as an inbound deposit.
    pub deposit_threshold: Amount,
    /// Minimum amount worth consolidating into the OPCU.
    pub collect_threshold: Amount,
    /// Minimum withdrawal amount.
    pub withdrawal_threshold: Amount,

    // ── Fees & gas ───────────────────────────────────────────────────────
    /// Withdrawal fee rate in basis points of the withdrawn amount.
    pub withdrawal_fee_rate_bps: u128,
    /// Exact gas limit expected on account-model transactions.
    pub gas_limit: u128,
    /// Configured gas price: raw fee units per estimated kilobyte (UTXO) or
    /// per gas unit (account model).
    pub gas_price: Amount,

    // ── SysTransfer ──────────────────────────────────────────────────────
    /// Fixed top-up amount when the recipient is a user CU address.
    pub sys_transfer_amount: Amount,
    /// Fixed top-up amount when the recipient is an OPCU address.
    pub op_cu_sys_transfer_amount: Amount,

    /// Foreign confirmations required before evidence counts.
    pub confirmations: u64,
    /// Ceiling on OPCUs custodying this symbol.
    pub max_op_cu_number: u32,
}

impl TokenInfo {
    /// A bitcoin-like UTXO token fixture.
    pub fn utxo_defaults(symbol: Symbol, chain: Chain) -> Self {
        Self {
            symbol,
            chain,
            tx_model: TxModel::Utxo,
            contract_address: None,
            decimals: 8,
            deposit_enabled: true,
            withdrawal_enabled: true,
            send_enabled: true,
            deposit_threshold: Amount::new(10_000),
            collect_threshold: Amount::new(10_000),
            withdrawal_threshold: Amount::new(20_000),
            withdrawal_fee_rate_bps: 20,
            gas_limit: 1,
            gas_price: Amount::new(10_000),
            sys_transfer_amount: Amount::new(100_000),
            op_cu_sys_transfer_amount: Amount::new(1_000_000),
            confirmations: 6,
            max_op_cu_number: 10,
        }
    }

    /// An ethereum-like account-model token fixture.
    pub fn account_defaults(symbol: Symbol, chain: Chain) -> Self {
        Self {
            symbol,
            chain,
            tx_model: TxModel::Account,
            contract_address: None,
            decimals: 18,
            deposit_enabled: true,
            withdrawal_enabled: true,
            send_enabled: true,
            deposit_threshold: Amount::new(10_000),
            collect_threshold: Amount::new(10_000),
            withdrawal_threshold: Amount::new(20_000),
            withdrawal_fee_rate_bps: 20,
            gas_limit: 21_000,
            gas_price: Amount::new(1_000),
            sys_transfer_amount: Amount::new(100_000),
            op_cu_sys_transfer_amount: Amount::new(1_000_000),
            confirmations: 12,
            max_op_cu_number: 10,
        }
    }

    pub fn is_contract_token(&self) -> bool {
        self.contract_address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip() {
        let token = TokenInfo::account_defaults(
            Symbol::new("eth").unwrap(),
            Chain::new("eth"),
        );
        let json = serde_json::to_string(&token).unwrap();
        let back: TokenInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, token.symbol);
        assert_eq!(back.gas_limit, 21_000);
        assert!(!back.is_contract_token());
    }
}
