//! The account-model verification pipeline.
//!
//! Account chains settle exactly one order per transaction, so the checks
//! are field-for-field: destination, amount, gas limit, gas-price band,
//! nonce, contract address, and the sender when it is recoverable. The
//! cryptographic signature check itself belongs to the chain adapter; this
//! pipeline assumes the payload decoded cleanly.

use crate::error::VerifyError;
use crate::gas::check_gas_price_value;
use custos_chain::tx::AccountTransaction;
use custos_types::{Amount, ExtAddress, TokenInfo};

/// What the single pending order says the transaction must look like.
pub struct ExpectedAccountTx<'a> {
    pub token: &'a TokenInfo,
    pub to: &'a ExtAddress,
    /// On-chain amount, after any fee deduction the orchestrator applied.
    pub amount: Amount,
    /// Expected sender; enforced only when known (signed payloads).
    pub from: Option<&'a ExtAddress>,
    /// Expected account nonce from the OPCU's asset address record.
    pub nonce: Option<u64>,
}

pub fn verify_account_tx(
    expected: &ExpectedAccountTx<'_>,
    tx: &AccountTransaction,
    batch_len: usize,
) -> Result<(), VerifyError> {
    if batch_len != 1 {
        return Err(VerifyError::SingleOrderRequired(batch_len));
    }

    if !tx.to.eq_canonical(expected.to) {
        return Err(VerifyError::ToMismatch {
            expected: expected.to.to_string(),
            found: tx.to.to_string(),
        });
    }
    if tx.amount != expected.amount {
        return Err(VerifyError::AmountMismatch {
            expected: expected.amount.raw(),
            found: tx.amount.raw(),
        });
    }

    // Contract tokens must go through their contract; native tokens must not
    // touch one.
    let contract_matches = match (&expected.token.contract_address, &tx.contract_address) {
        (Some(want), Some(have)) => want.eq_canonical(have),
        (None, None) => true,
        _ => false,
    };
    if !contract_matches {
        let display = |a: &Option<ExtAddress>| {
            a.as_ref().map_or_else(|| "native".to_string(), |a| a.to_string())
        };
        return Err(VerifyError::ContractMismatch {
            expected: display(&expected.token.contract_address),
            found: display(&tx.contract_address),
        });
    }

    if tx.gas_limit != expected.token.gas_limit {
        return Err(VerifyError::GasLimitMismatch {
            expected: expected.token.gas_limit,
            found: tx.gas_limit,
        });
    }
    check_gas_price_value(tx.gas_price, expected.token.gas_price)?;

    if let Some(nonce) = expected.nonce {
        if tx.nonce != nonce {
            return Err(VerifyError::NonceMismatch {
                expected: nonce,
                found: tx.nonce,
            });
        }
    }

    if let Some(from) = expected.from {
        match &tx.from {
            Some(have) if have.eq_canonical(from) => {}
            other => {
                return Err(VerifyError::FromMismatch {
                    expected: from.to_string(),
                    found: other
                        .as_ref()
                        .map_or_else(|| "unknown".to_string(), |a| a.to_string()),
                })
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_types::{Chain, Symbol};

    fn token() -> TokenInfo {
        TokenInfo::account_defaults(Symbol::new("eth").unwrap(), Chain::new("eth"))
    }

    fn tx() -> AccountTransaction {
        AccountTransaction {
            hash: "settle".into(),
            from: Some(ExtAddress::new("0xopcu")),
            to: ExtAddress::new("0xdest"),
            amount: Amount::new(500_000),
            nonce: 7,
            gas_limit: 21_000,
            gas_price: Amount::new(1_000),
            contract_address: None,
        }
    }

    fn dest() -> ExtAddress {
        // Deliberately upper-cased; matching is canonical.
        ExtAddress::new("0xDEST")
    }

    fn expected<'a>(token: &'a TokenInfo, to: &'a ExtAddress) -> ExpectedAccountTx<'a> {
        ExpectedAccountTx {
            token,
            to,
            amount: Amount::new(500_000),
            from: None,
            nonce: Some(7),
        }
    }

    #[test]
    fn well_formed_transaction_passes() {
        let token = token();
        let to = dest();
        assert_eq!(verify_account_tx(&expected(&token, &to), &tx(), 1), Ok(()));
    }

    #[test]
    fn batches_are_rejected() {
        let token = token();
        let to = dest();
        assert_eq!(
            verify_account_tx(&expected(&token, &to), &tx(), 2),
            Err(VerifyError::SingleOrderRequired(2))
        );
    }

    #[test]
    fn destination_mismatch_rejected() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.to = ExtAddress::new("0xother");
        assert!(matches!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::ToMismatch { .. })
        ));
    }

    #[test]
    fn amount_must_be_exact() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.amount = Amount::new(499_999);
        assert!(matches!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::AmountMismatch { .. })
        ));
    }

    #[test]
    fn native_token_rejects_contract_call() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.contract_address = Some(ExtAddress::new("0xc0ffee"));
        assert!(matches!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::ContractMismatch { .. })
        ));
    }

    #[test]
    fn contract_token_requires_its_contract() {
        let mut token = token();
        let to = dest();
        token.contract_address = Some(ExtAddress::new("0xC0FFEE"));
        let mut t = tx();

        // missing contract call
        assert!(matches!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::ContractMismatch { .. })
        ));

        // case-insensitive match passes
        t.contract_address = Some(ExtAddress::new("0xc0ffee"));
        assert_eq!(verify_account_tx(&expected(&token, &to), &t, 1), Ok(()));
    }

    #[test]
    fn gas_limit_must_be_exact() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.gas_limit = 21_001;
        assert!(matches!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::GasLimitMismatch { .. })
        ));
    }

    #[test]
    fn gas_price_band_enforced() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.gas_price = Amount::new(1_201);
        assert_eq!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::GasPriceTooHigh)
        );
        t.gas_price = Amount::new(799);
        assert_eq!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::GasPriceTooLow)
        );
    }

    #[test]
    fn nonce_enforced_when_expected() {
        let token = token();
        let to = dest();
        let mut t = tx();
        t.nonce = 8;
        assert_eq!(
            verify_account_tx(&expected(&token, &to), &t, 1),
            Err(VerifyError::NonceMismatch {
                expected: 7,
                found: 8
            })
        );
    }

    #[test]
    fn sender_enforced_on_signed_payloads() {
        let token = token();
        let to = dest();
        let from = ExtAddress::new("0xOPCU");
        let mut exp = expected(&token, &to);
        exp.from = Some(&from);

        // case-insensitive match
        assert_eq!(verify_account_tx(&exp, &tx(), 1), Ok(()));

        let mut t = tx();
        t.from = None;
        assert!(matches!(
            verify_account_tx(&exp, &t, 1),
            Err(VerifyError::FromMismatch { .. })
        ));
    }
}
