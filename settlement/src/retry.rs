//! Quorum-gated recovery of stuck in-flight orders.

use crate::error::SettlementError;
use crate::flows::{Flow, OrderFlow, Receipt};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_orders::{Order, OrderStatus, OutPoint, WithdrawalOrder};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::DepositStore;
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{Amount, CuAddress, DepositStatus, OrderId, TxModel, ValidatorId};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

impl<S, A, R, E> SettlementKeeper<'_, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    /// Roll a set of stuck orders back to `Begin`, undoing every side
    /// effect of their wait-sign step.
    ///
    /// Requires quorum over the order set and the submitted evidence (the
    /// failed broadcast, the signing-round abort, whatever the operators
    /// observed). Orders already in `Begin` or `Finish` are skipped, so a
    /// retry racing a successful finish is harmless: the finish wins and
    /// the retry becomes a no-op for that order.
    ///
    /// What is undone per type:
    /// - Collect: the user's asset hold is released and the deposit item
    ///   returns to `WaitCollect`.
    /// - Withdrawal: the funding OPCU's hold is released, its consumed
    ///   items return to `Confirmed`, and its send capability is restored.
    ///   The user's coin hold stays — the withdrawal itself is still owed.
    /// - SysTransfer: nothing was held; only the binding is cleared.
    /// - OpcuAssetTransfer: the migration hold is released and the item
    ///   set returns to `Confirmed`.
    pub fn order_retry(
        &self,
        validator: &ValidatorId,
        order_ids: &[OrderId],
        evidence: &[u8],
    ) -> Result<Receipt, SettlementError> {
        let tally_id = Self::tally_id(order_ids)?;
        let orders = self.load_orders(order_ids)?;

        let stuck: Vec<Order> = orders
            .into_iter()
            .filter(|o| {
                matches!(o.status(), OrderStatus::WaitSign | OrderStatus::SignFinish)
            })
            .collect();
        if stuck.is_empty() {
            return Ok(Receipt::empty());
        }

        let digest = Self::confirm_digest("order_retry", order_ids, evidence);
        let conflicting = match self
            .book()
            .submit(&tally_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%tally_id, votes, "retry confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%tally_id, votes, orders = stuck.len(), "order retry reached quorum");
                conflicting
            }
        };

        let mut receipt = Receipt::empty();
        // Withdrawal batches share one transaction; undo their funding OPCU
        // hold once per batch, not once per order.
        let mut withdrawal_groups: BTreeMap<CuAddress, Vec<WithdrawalOrder>> = BTreeMap::new();

        for order in &stuck {
            match order {
                Order::Collect(c) => self.retry_collect(c)?,
                Order::Withdrawal(w) => {
                    let opcu = w.opcu.clone().ok_or_else(|| {
                        SettlementError::InvalidOrder(format!(
                            "withdrawal {} has no bound opcu",
                            w.base.id
                        ))
                    })?;
                    withdrawal_groups.entry(opcu).or_default().push(w.clone());
                }
                Order::SysTransfer(s) => {
                    let mut updated = s.clone();
                    updated.raw_data.clear();
                    updated.signed_tx.clear();
                    updated.cost_fee = Amount::ZERO;
                    let mut reset = Order::SysTransfer(updated);
                    self.orders().reset_to_begin(&mut reset)?;
                }
                Order::OpcuAssetTransfer(m) => self.retry_migration(m)?,
                Order::KeyGen(k) => {
                    warn!(order_id = %k.base.id, "keygen orders are not retryable, skipping");
                    continue;
                }
            }
            receipt.push(Flow::Order(OrderFlow {
                cu: order.base().cu_address.clone(),
                order_id: order.id(),
                order_type: order.order_type(),
                status: OrderStatus::Begin,
            }));
        }
        for (opcu, group) in &withdrawal_groups {
            self.retry_withdrawal_group(opcu, group)?;
        }

        self.book().conclude(&tally_id)?;
        self.forward_misbehaviour(&tally_id, &conflicting);
        Ok(receipt)
    }

    fn retry_collect(
        &self,
        c: &custos_orders::CollectOrder,
    ) -> Result<(), SettlementError> {
        let ledger = self.ledger();
        let cu = &c.base.cu_address;
        let symbol = &c.base.symbol;
        ledger.release_asset_hold(cu, symbol, c.amount)?;
        ledger.set_deposit_status(symbol, cu, &c.tx_hash, c.index, DepositStatus::WaitCollect)?;

        let mut updated = c.clone();
        updated.collect_to = None;
        updated.raw_data.clear();
        updated.signed_tx.clear();
        updated.vins.clear();
        updated.cost_fee = Amount::ZERO;
        let mut reset = Order::Collect(updated);
        self.orders().reset_to_begin(&mut reset)?;
        Ok(())
    }

    fn retry_withdrawal_group(
        &self,
        opcu: &CuAddress,
        group: &[WithdrawalOrder],
    ) -> Result<(), SettlementError> {
        let symbol = group[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        let ledger = self.ledger();

        let total_payout = Self::checked_total(group.iter().map(|w| w.amount))?;
        let hold = match token.tx_model {
            TxModel::Utxo => total_payout
                .checked_add(group[0].cost_fee)
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?,
            TxModel::Account => total_payout,
        };
        ledger.release_asset_hold(opcu, &symbol, hold)?;

        let mut seen: Vec<&OutPoint> = Vec::new();
        for vin in group.iter().flat_map(|w| w.vins.iter()) {
            if seen.iter().any(|v| v.tx_hash == vin.tx_hash && v.index == vin.index) {
                continue;
            }
            ledger.set_deposit_status(
                &symbol,
                opcu,
                &vin.tx_hash,
                vin.index,
                DepositStatus::Confirmed,
            )?;
            seen.push(vin);
        }
        ledger.set_send_enabled(opcu, &token.chain, true)?;

        for w in group {
            let mut updated = w.clone();
            updated.opcu = None;
            updated.raw_data.clear();
            updated.signed_tx.clear();
            updated.vins.clear();
            updated.cost_fee = Amount::ZERO;
            let mut reset = Order::Withdrawal(updated);
            self.orders().reset_to_begin(&mut reset)?;
        }
        Ok(())
    }

    fn retry_migration(
        &self,
        m: &custos_orders::OpcuAssetTransferOrder,
    ) -> Result<(), SettlementError> {
        let ledger = self.ledger();
        let opcu = &m.base.cu_address;
        let symbol = &m.base.symbol;
        let token = self.token(symbol)?;

        let held = match token.tx_model {
            TxModel::Utxo => m
                .total_amount()
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?,
            TxModel::Account => ledger.get_asset(opcu)?.hold_of(symbol),
        };
        ledger.release_asset_hold(opcu, symbol, held)?;
        for item in &m.items {
            ledger.set_deposit_status(
                symbol,
                opcu,
                &item.tx_hash,
                item.index,
                DepositStatus::Confirmed,
            )?;
        }

        let mut updated = m.clone();
        updated.raw_data.clear();
        updated.signed_tx.clear();
        updated.cost_fee = Amount::ZERO;
        let mut reset = Order::OpcuAssetTransfer(updated);
        self.orders().reset_to_begin(&mut reset)?;
        Ok(())
    }
}
