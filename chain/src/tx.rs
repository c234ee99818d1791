//! Normalized decoded-transaction records.
//!
//! Adapters reduce every chain's wire format to these two shapes; all
//! verification downstream works only on them.

use custos_types::{Amount, ExtAddress};
use serde::{Deserialize, Serialize};

/// One transaction input referencing a previous outpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoIn {
    pub tx_hash: String,
    pub index: u64,
    /// The amount of the referenced outpoint as decoded by the adapter.
    pub amount: Amount,
    /// The address the referenced outpoint pays to.
    pub address: ExtAddress,
}

impl UtxoIn {
    pub fn outpoint(&self) -> (&str, u64) {
        (&self.tx_hash, self.index)
    }
}

/// One transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoOut {
    pub address: ExtAddress,
    pub amount: Amount,
}

/// A decoded UTXO-model transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoTransaction {
    pub hash: String,
    pub vins: Vec<UtxoIn>,
    pub vouts: Vec<UtxoOut>,
    /// `Σvin − Σvout` as reported by the adapter; verification recomputes
    /// and must agree exactly.
    pub cost_fee: Amount,
    /// Estimated serialized size in kilobytes, for the gas-price band.
    pub estimated_size_kb: u128,
}

impl UtxoTransaction {
    /// Σ of the input amounts, `None` if an adapter-decoded tx overflows.
    pub fn vin_total(&self) -> Option<Amount> {
        Amount::checked_sum(self.vins.iter().map(|v| v.amount))
    }

    /// Σ of the output amounts, `None` if an adapter-decoded tx overflows.
    pub fn vout_total(&self) -> Option<Amount> {
        Amount::checked_sum(self.vouts.iter().map(|v| v.amount))
    }
}

/// A decoded account-model transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub hash: String,
    /// `None` on raw unsigned payloads where the sender is not yet
    /// recoverable; always present on signed payloads.
    pub from: Option<ExtAddress>,
    pub to: ExtAddress,
    pub amount: Amount,
    pub nonce: u64,
    pub gas_limit: u128,
    pub gas_price: Amount,
    /// The token contract invoked, for contract-based transfers.
    pub contract_address: Option<ExtAddress>,
}
