//! The chain adapter trait.

use crate::error::ChainError;
use crate::tx::{AccountTransaction, UtxoIn, UtxoTransaction};
use custos_types::{Chain, ExtAddress, Symbol};

/// Per-chain RPC adapter seam.
///
/// Implementations decode raw and signed transaction payloads into the
/// normalized records and validate foreign addresses. Decoding must be
/// deterministic: every validator feeds the same bytes and must obtain the
/// same record, or quorum can never form.
pub trait ChainAdapter {
    /// Validate and canonicalize a foreign address for a chain/symbol.
    fn valid_address(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        address: &str,
    ) -> Result<ExtAddress, ChainError>;

    fn query_utxo_transaction_from_data(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<UtxoTransaction, ChainError>;

    fn query_utxo_transaction_from_signed_data(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        signed_data: &[u8],
    ) -> Result<UtxoTransaction, ChainError>;

    /// Decode only the input list of a raw UTXO payload.
    fn query_utxo_ins_from_data(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<Vec<UtxoIn>, ChainError>;

    fn query_account_transaction_from_data(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        raw_data: &[u8],
    ) -> Result<AccountTransaction, ChainError>;

    fn query_account_transaction_from_signed_data(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        signed_data: &[u8],
    ) -> Result<AccountTransaction, ChainError>;

    /// Check the signatures of a signed UTXO payload against the addresses
    /// its inputs spend from.
    fn verify_utxo_signed_transaction(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        input_addresses: &[ExtAddress],
        signed_data: &[u8],
    ) -> Result<bool, ChainError>;

    /// Check the signature of a signed account payload against the expected
    /// sender.
    fn verify_account_signed_transaction(
        &self,
        chain: &Chain,
        symbol: &Symbol,
        from: &ExtAddress,
        signed_data: &[u8],
    ) -> Result<bool, ChainError>;
}
