//! The UTXO verification pipeline.
//!
//! Six ordered, fail-fast checks over a decoded vin/vout transaction:
//!
//! 1. every vin matches the declared outpoint set, positionally, and
//!    references a known spendable deposit item of the right amount;
//! 2. value is conserved: `Σvin − Σvout` equals the declared cost fee;
//! 3. every pending order's payout appears as a vout with the exact
//!    destination and amount;
//! 4. every remaining vout pays change back to an address the OPCU owns;
//! 5. the fee sits inside the gas-price band;
//! 6. the total payout is covered by booked asset coins and each payout
//!    clears the configured threshold.

use crate::error::VerifyError;
use crate::gas::check_gas_price_band;
use custos_chain::tx::{UtxoOut, UtxoTransaction};
use custos_orders::OutPoint;
use custos_store::deposit::DepositItem;
use custos_types::{Amount, DepositStatus, ExtAddress, OrderId, TokenInfo};

/// One payout a pending order expects the settlement transaction to make.
#[derive(Clone, Debug)]
pub struct ExpectedPayout {
    pub order_id: OrderId,
    pub to: ExtAddress,
    pub amount: Amount,
}

/// Everything the pipeline needs beyond the transaction itself.
pub struct UtxoVerifyContext<'a> {
    pub token: &'a TokenInfo,
    /// Addresses the OPCU owns across epochs; change must return to one.
    pub own_addresses: &'a [ExtAddress],
    /// The OPCU's booked asset coins for this symbol.
    pub asset_coins: Amount,
    /// The vin set the orders declared, in declaration order.
    pub declared_vins: &'a [OutPoint],
    /// Deposit items of the spending CU; the universe vins may reference.
    pub deposits: &'a [DepositItem],
    /// Status a referenced item must be in to count as spendable here.
    pub spendable_status: DepositStatus,
    /// Minimum per-payout amount (collect or withdrawal threshold).
    pub threshold: Amount,
}

/// Aggregate handed back to the orchestrator after a transaction passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoVerification {
    pub vin_total: Amount,
    pub total_payout: Amount,
    pub cost_fee: Amount,
    /// Vouts paying back to own addresses; minted as fresh deposit items
    /// once the settlement confirms.
    pub change: Vec<UtxoOut>,
}

pub fn verify_utxo_tx(
    ctx: &UtxoVerifyContext<'_>,
    payouts: &[ExpectedPayout],
    tx: &UtxoTransaction,
) -> Result<UtxoVerification, VerifyError> {
    // 1. Vins match the declared set exactly, in order, and each one
    //    references a spendable item with the decoded amount.
    if tx.vins.len() != ctx.declared_vins.len() {
        return Err(VerifyError::VinMismatch(format!(
            "declared {} inputs, transaction has {}",
            ctx.declared_vins.len(),
            tx.vins.len()
        )));
    }
    for (vin, declared) in tx.vins.iter().zip(ctx.declared_vins) {
        if vin.tx_hash != declared.tx_hash || vin.index != declared.index {
            return Err(VerifyError::VinMismatch(format!(
                "expected {}:{}, found {}:{}",
                declared.tx_hash, declared.index, vin.tx_hash, vin.index
            )));
        }
        let item = ctx
            .deposits
            .iter()
            .find(|d| d.tx_hash == vin.tx_hash && d.index == vin.index)
            .ok_or_else(|| VerifyError::UnknownUtxo {
                tx_hash: vin.tx_hash.clone(),
                index: vin.index,
            })?;
        if item.status != ctx.spendable_status {
            return Err(VerifyError::UtxoNotSpendable {
                tx_hash: vin.tx_hash.clone(),
                index: vin.index,
            });
        }
        if item.amount != vin.amount {
            return Err(VerifyError::VinMismatch(format!(
                "{}:{} amount {} does not match the recorded item {}",
                vin.tx_hash, vin.index, vin.amount, item.amount
            )));
        }
    }

    // 2. Conservation: recomputed fee must equal the declared one. The
    //    sums come from adapter-decoded data, so overflow is a rejection,
    //    not a panic.
    let vin_total = tx.vin_total().ok_or(VerifyError::AmountOverflow)?;
    let vout_total = tx.vout_total().ok_or(VerifyError::AmountOverflow)?;
    let computed_fee = vin_total.checked_sub(vout_total);
    if computed_fee != Some(tx.cost_fee) {
        return Err(VerifyError::FeeMismatch {
            vin_total: vin_total.raw(),
            vout_total: vout_total.raw(),
            cost_fee: tx.cost_fee.raw(),
        });
    }

    // 3. One distinct vout per expected payout, exact destination and amount.
    let mut used = vec![false; tx.vouts.len()];
    for payout in payouts {
        let slot = tx.vouts.iter().enumerate().find(|(i, v)| {
            !used[*i] && v.address.eq_canonical(&payout.to) && v.amount == payout.amount
        });
        match slot {
            Some((i, _)) => used[i] = true,
            None => {
                return Err(VerifyError::PayoutMismatch {
                    to: payout.to.to_string(),
                    amount: payout.amount.raw(),
                })
            }
        }
    }

    // 4. Whatever remains must be change back to the OPCU's own addresses.
    let mut change = Vec::new();
    for (i, vout) in tx.vouts.iter().enumerate() {
        if used[i] {
            continue;
        }
        if !ctx.own_addresses.iter().any(|a| a.eq_canonical(&vout.address)) {
            return Err(VerifyError::UnexpectedVout(vout.address.to_string()));
        }
        change.push(vout.clone());
    }

    // 5. Fee band.
    check_gas_price_band(tx.cost_fee, tx.estimated_size_kb, ctx.token.gas_price)?;

    // 6. Coverage and thresholds.
    let total_payout = Amount::checked_sum(payouts.iter().map(|p| p.amount))
        .ok_or(VerifyError::AmountOverflow)?;
    if total_payout > ctx.asset_coins {
        return Err(VerifyError::InsufficientCoins {
            needed: total_payout.raw(),
            available: ctx.asset_coins.raw(),
        });
    }
    for payout in payouts {
        if payout.amount < ctx.threshold {
            return Err(VerifyError::BelowThreshold {
                amount: payout.amount.raw(),
                threshold: ctx.threshold.raw(),
            });
        }
    }

    Ok(UtxoVerification {
        vin_total,
        total_payout,
        cost_fee: tx.cost_fee,
        change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use custos_chain::tx::UtxoIn;
    use custos_types::{Chain, CuAddress, Symbol, TokenInfo};
    use proptest::prelude::*;

    fn token() -> TokenInfo {
        let mut t = TokenInfo::utxo_defaults(Symbol::new("btc").unwrap(), Chain::new("btc"));
        // reference fee per kb: 10_000, band [8_000, 12_000] at 1 kb
        t.gas_price = Amount::new(10_000);
        t
    }

    fn item(tx_hash: &str, index: u64, amount: u128) -> DepositItem {
        DepositItem {
            symbol: Symbol::new("btc").unwrap(),
            cu_address: CuAddress::new("cu_opbtc").unwrap(),
            tx_hash: tx_hash.into(),
            index,
            amount: Amount::new(amount),
            ext_address: ExtAddress::new("bc1qold"),
            memo: String::new(),
            status: DepositStatus::Confirmed,
        }
    }

    struct Fixture {
        token: TokenInfo,
        own: Vec<ExtAddress>,
        deposits: Vec<DepositItem>,
        declared: Vec<OutPoint>,
        payouts: Vec<ExpectedPayout>,
        tx: UtxoTransaction,
    }

    /// Two inputs (60k + 50k), one 80k payout, 20k change, 10k fee.
    fn fixture() -> Fixture {
        let deposits = vec![item("aa", 0, 60_000), item("bb", 1, 50_000)];
        let declared = vec![
            OutPoint { tx_hash: "aa".into(), index: 0 },
            OutPoint { tx_hash: "bb".into(), index: 1 },
        ];
        let payouts = vec![ExpectedPayout {
            order_id: OrderId::random(),
            to: ExtAddress::new("bc1qdest"),
            amount: Amount::new(80_000),
        }];
        let tx = UtxoTransaction {
            hash: "settle".into(),
            vins: vec![
                UtxoIn {
                    tx_hash: "aa".into(),
                    index: 0,
                    amount: Amount::new(60_000),
                    address: ExtAddress::new("bc1qold"),
                },
                UtxoIn {
                    tx_hash: "bb".into(),
                    index: 1,
                    amount: Amount::new(50_000),
                    address: ExtAddress::new("bc1qold"),
                },
            ],
            vouts: vec![
                UtxoOut {
                    address: ExtAddress::new("bc1qdest"),
                    amount: Amount::new(80_000),
                },
                UtxoOut {
                    address: ExtAddress::new("bc1qown"),
                    amount: Amount::new(20_000),
                },
            ],
            cost_fee: Amount::new(10_000),
            estimated_size_kb: 1,
        };
        Fixture {
            token: token(),
            own: vec![ExtAddress::new("bc1qown")],
            deposits,
            declared,
            payouts,
            tx,
        }
    }

    fn ctx(f: &Fixture) -> UtxoVerifyContext<'_> {
        UtxoVerifyContext {
            token: &f.token,
            own_addresses: &f.own,
            asset_coins: Amount::new(1_000_000),
            declared_vins: &f.declared,
            deposits: &f.deposits,
            spendable_status: DepositStatus::Confirmed,
            threshold: f.token.collect_threshold,
        }
    }

    #[test]
    fn well_formed_transaction_passes() {
        let f = fixture();
        let out = verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx).unwrap();
        assert_eq!(out.vin_total, Amount::new(110_000));
        assert_eq!(out.total_payout, Amount::new(80_000));
        assert_eq!(out.cost_fee, Amount::new(10_000));
        assert_eq!(out.change.len(), 1);
        assert_eq!(out.change[0].amount, Amount::new(20_000));
    }

    #[test]
    fn unknown_vin_rejected() {
        let mut f = fixture();
        f.deposits.remove(1);
        assert_eq!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::UnknownUtxo {
                tx_hash: "bb".into(),
                index: 1
            })
        );
    }

    #[test]
    fn vin_order_must_match_declaration() {
        let mut f = fixture();
        f.declared.swap(0, 1);
        assert!(matches!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::VinMismatch(_))
        ));
    }

    #[test]
    fn unspendable_item_rejected() {
        let mut f = fixture();
        f.deposits[0].status = DepositStatus::InProcess;
        assert_eq!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::UtxoNotSpendable {
                tx_hash: "aa".into(),
                index: 0
            })
        );
    }

    #[test]
    fn overflowing_vin_sum_is_rejected_not_panicking() {
        let mut f = fixture();
        f.deposits[0].amount = Amount::new(u128::MAX);
        f.deposits[1].amount = Amount::new(1);
        f.tx.vins[0].amount = Amount::new(u128::MAX);
        f.tx.vins[1].amount = Amount::new(1);
        assert_eq!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::AmountOverflow)
        );
    }

    #[test]
    fn declared_fee_must_equal_computed() {
        let mut f = fixture();
        f.tx.cost_fee = Amount::new(9_999);
        assert!(matches!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::FeeMismatch { .. })
        ));
    }

    #[test]
    fn missing_payout_rejected() {
        let mut f = fixture();
        f.payouts[0].amount = Amount::new(80_001);
        assert!(matches!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::PayoutMismatch { .. })
        ));
    }

    #[test]
    fn payout_address_comparison_ignores_case() {
        let mut f = fixture();
        f.payouts[0].to = ExtAddress::new("BC1QDEST");
        assert!(verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx).is_ok());
    }

    #[test]
    fn change_to_foreign_address_rejected() {
        let mut f = fixture();
        f.own.clear();
        assert_eq!(
            verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx),
            Err(VerifyError::UnexpectedVout("bc1qown".into()))
        );
    }

    #[test]
    fn band_edges_are_accepted() {
        // Shift value between change and fee so conservation keeps holding.
        for (fee, change, expect) in [
            (8_000u128, 22_000u128, Ok(())),
            (12_000, 18_000, Ok(())),
            (7_999, 22_001, Err(VerifyError::GasPriceTooLow)),
            (12_001, 17_999, Err(VerifyError::GasPriceTooHigh)),
        ] {
            let mut f = fixture();
            f.tx.cost_fee = Amount::new(fee);
            f.tx.vouts[1].amount = Amount::new(change);
            assert_eq!(
                verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx).map(|_| ()),
                expect,
                "fee {fee}"
            );
        }
    }

    #[test]
    fn payout_beyond_asset_coins_rejected() {
        let f = fixture();
        let mut c = ctx(&f);
        c.asset_coins = Amount::new(79_999);
        assert_eq!(
            verify_utxo_tx(&c, &f.payouts, &f.tx),
            Err(VerifyError::InsufficientCoins {
                needed: 80_000,
                available: 79_999
            })
        );
    }

    #[test]
    fn payout_below_threshold_rejected() {
        let f = fixture();
        let mut c = ctx(&f);
        c.threshold = Amount::new(80_001);
        assert!(matches!(
            verify_utxo_tx(&c, &f.payouts, &f.tx),
            Err(VerifyError::BelowThreshold { .. })
        ));
    }

    proptest! {
        /// Conservation is decided purely by `Σvin − Σvout == cost_fee`:
        /// a consistent fee never reports `FeeMismatch`, a skewed one
        /// always does.
        #[test]
        fn fee_mismatch_iff_sums_disagree(
            vin_a in 1_000u128..1_000_000,
            vin_b in 1_000u128..1_000_000,
            fee in 0u128..1_000,
            skew in 1u128..500,
        ) {
            let mut f = fixture();
            f.deposits[0].amount = Amount::new(vin_a);
            f.deposits[1].amount = Amount::new(vin_b);
            f.tx.vins[0].amount = Amount::new(vin_a);
            f.tx.vins[1].amount = Amount::new(vin_b);
            f.tx.vouts[0].amount = Amount::new(vin_a);
            f.tx.vouts[1].amount = Amount::new(vin_b - fee);
            f.payouts[0].amount = Amount::new(vin_a);
            f.tx.cost_fee = Amount::new(fee);

            let consistent = verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx);
            prop_assert!(
                !matches!(consistent, Err(VerifyError::FeeMismatch { .. })),
                "consistent fee must not raise FeeMismatch: {:?}",
                consistent
            );

            f.tx.cost_fee = Amount::new(fee + skew);
            let skewed = verify_utxo_tx(&ctx(&f), &f.payouts, &f.tx);
            prop_assert!(
                matches!(skewed, Err(VerifyError::FeeMismatch { .. })),
                "skewed fee must raise FeeMismatch: {:?}",
                skewed
            );
        }
    }
}
