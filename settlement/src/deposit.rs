//! Deposit intake and quorum-gated deposit confirmation.

use crate::error::SettlementError;
use crate::flows::{DepositConfirmedFlow, Flow, OrderFlow, Receipt};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_orders::{CollectOrder, DepositConfirmStatus, Order, OrderBase};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::{DepositItem, DepositStore};
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{Amount, CuAddress, CuKind, DepositStatus, OrderId, Symbol, ValidatorId};
use std::collections::BTreeMap;
use tracing::{debug, info};

impl<S, A, R, E> SettlementKeeper<'_, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    /// Record observed deposit evidence as a `Collect` order in `Begin`.
    ///
    /// Nothing is credited here: balances move only once the deposit is
    /// quorum-confirmed.
    #[allow(clippy::too_many_arguments)]
    pub fn deposit(
        &self,
        from_cu: &CuAddress,
        to_cu: &CuAddress,
        order_id: OrderId,
        symbol: &Symbol,
        to_address: &str,
        tx_hash: &str,
        index: u64,
        amount: Amount,
        memo: &str,
    ) -> Result<Receipt, SettlementError> {
        let token = self.token(symbol)?;
        if !token.deposit_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "deposit disabled for {symbol}"
            )));
        }
        if !token.send_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "send disabled for {symbol}"
            )));
        }
        self.require_cu(from_cu)?;
        self.require_cu(to_cu)?;

        if self.orders().exists(&order_id)? {
            return Err(SettlementError::InvalidOrder(format!(
                "order id {order_id} already used"
            )));
        }

        // The destination must be the CU's registered address on the
        // token's chain, compared case-insensitively.
        let ext = self.adapter.valid_address(&token.chain, symbol, to_address)?;
        let asset = self
            .ledger()
            .get_asset(to_cu)
            .map_err(|_| SettlementError::InvalidAddress(ext.to_string()))?;
        if !asset.owns_address(&token.chain, &ext) {
            return Err(SettlementError::InvalidAddress(ext.to_string()));
        }

        if amount < token.deposit_threshold {
            return Err(SettlementError::AmountError(format!(
                "deposit {amount} below threshold {}",
                token.deposit_threshold
            )));
        }
        if DepositStore::exists(self.store, symbol, to_cu, tx_hash, index)? {
            return Err(SettlementError::InvalidTx(format!(
                "outpoint {tx_hash}:{index} already recorded"
            )));
        }

        // Track the claimed outpoint right away. The item sits in
        // `UnCollected` until quorum confirms or invalidates it; an
        // invalidated item is removed, freeing the outpoint.
        self.ledger().new_deposit_item(DepositItem {
            symbol: symbol.clone(),
            cu_address: to_cu.clone(),
            tx_hash: tx_hash.to_string(),
            index,
            amount,
            ext_address: ext.clone(),
            memo: memo.to_string(),
            status: DepositStatus::UnCollected,
        })?;

        let order = Order::Collect(CollectOrder::new(
            OrderBase::new(order_id, to_cu.clone(), symbol.clone(), self.height),
            from_cu.clone(),
            ext,
            tx_hash.to_string(),
            index,
            amount,
            memo.to_string(),
        ));
        self.orders().new_order(&order)?;
        debug!(%order_id, %to_cu, %symbol, %amount, "deposit order created");

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: to_cu.clone(),
            order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        Ok(receipt)
    }

    /// Quorum-gated deposit confirmation for a batch of Collect orders.
    ///
    /// `order_ids` are attested as real on-chain inflows, `invalid_order_ids`
    /// as claims with no matching transaction. Both lists are folded into the
    /// attested digest, so validators that split the same batch differently
    /// submit conflicting payloads and never merge into one quorum.
    ///
    /// On the vote that crosses two-thirds: user CUs are credited and their
    /// deposit items moved to `WaitCollect` for later consolidation; OPCU
    /// deposits are auto-collected (asset coins credited, item `Confirmed`).
    /// Invalid orders are marked and their tracking items removed, freeing
    /// the outpoints. Confirmations after execution are accepted no-ops with
    /// an empty receipt.
    pub fn confirmed_deposit(
        &self,
        validator: &ValidatorId,
        order_ids: &[OrderId],
        invalid_order_ids: &[OrderId],
    ) -> Result<Receipt, SettlementError> {
        if order_ids.iter().any(|id| invalid_order_ids.contains(id)) {
            return Err(SettlementError::InvalidOrder(
                "order attested both valid and invalid".into(),
            ));
        }
        let all_ids: Vec<OrderId> = order_ids
            .iter()
            .chain(invalid_order_ids)
            .copied()
            .collect();
        let tally_id = Self::tally_id(&all_ids)?;

        let pending = self.pending_collects(order_ids)?;
        let pending_invalid = self.pending_collects(invalid_order_ids)?;
        // Every order already resolved: idempotent success.
        if pending.is_empty() && pending_invalid.is_empty() {
            return Ok(Receipt::empty());
        }

        let mut evidence = b"invalid".to_vec();
        let mut invalid_sorted: Vec<String> =
            invalid_order_ids.iter().map(|id| id.to_string()).collect();
        invalid_sorted.sort();
        for id in &invalid_sorted {
            evidence.extend_from_slice(id.as_bytes());
        }
        let digest = Self::confirm_digest("confirmed_deposit", &all_ids, &evidence);
        let conflicting = match self
            .book()
            .submit(&tally_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%tally_id, votes, "deposit confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%tally_id, votes, "deposit confirmation reached quorum");
                conflicting
            }
        };

        // Snapshot balances per (cu, symbol) before mutating.
        let ledger = self.ledger();
        let mut snapshots: BTreeMap<(CuAddress, Symbol), (Amount, Amount)> = BTreeMap::new();
        for c in &pending {
            let cu = c.base.cu_address.clone();
            let symbol = c.base.symbol.clone();
            snapshots.entry((cu.clone(), symbol.clone())).or_insert({
                match ledger.get_cu(&cu)?.kind {
                    CuKind::User => {
                        let info = ledger.get_cu(&cu)?;
                        (info.coins, info.coins_hold)
                    }
                    CuKind::Op => {
                        let asset = ledger.ensure_asset(&cu)?;
                        (asset.coins_of(&symbol), asset.hold_of(&symbol))
                    }
                }
            });
        }

        for c in &pending {
            let cu = &c.base.cu_address;
            let symbol = &c.base.symbol;
            let kind = ledger.get_cu(cu)?.kind;
            let status = match kind {
                CuKind::User => DepositStatus::WaitCollect,
                CuKind::Op => DepositStatus::Confirmed,
            };
            ledger.set_deposit_status(symbol, cu, &c.tx_hash, c.index, status)?;
            match kind {
                CuKind::User => {
                    ledger.add_coins(cu, c.amount)?;
                    ledger.add_asset_coins(cu, symbol, c.amount)?;
                }
                CuKind::Op => {
                    ledger.add_asset_coins(cu, symbol, c.amount)?;
                }
            }

            let mut updated = Order::Collect(c.clone());
            if let Order::Collect(ref mut uc) = updated {
                uc.deposit_status = DepositConfirmStatus::Confirmed;
            }
            self.orders().set_order(&updated)?;
        }

        for c in &pending_invalid {
            let cu = &c.base.cu_address;
            let symbol = &c.base.symbol;
            ledger.consume_deposit_item(symbol, cu, &c.tx_hash, c.index)?;

            let mut updated = Order::Collect(c.clone());
            if let Order::Collect(ref mut uc) = updated {
                uc.deposit_status = DepositConfirmStatus::Invalid;
            }
            self.orders().set_order(&updated)?;
        }

        let mut receipt = Receipt::empty();
        receipt.push(Flow::DepositConfirmed(DepositConfirmedFlow {
            order_ids: pending.iter().map(|c| c.base.id).collect(),
            invalid_order_ids: pending_invalid.iter().map(|c| c.base.id).collect(),
        }));
        for ((cu, symbol), (prev_balance, prev_hold)) in &snapshots {
            let (balance, hold) = match ledger.get_cu(cu)?.kind {
                CuKind::User => {
                    let info = ledger.get_cu(cu)?;
                    (info.coins, info.coins_hold)
                }
                CuKind::Op => {
                    let asset = ledger.get_asset(cu)?;
                    (asset.coins_of(symbol), asset.hold_of(symbol))
                }
            };
            receipt.push(Self::balance_flow(
                cu,
                symbol,
                *prev_balance,
                *prev_hold,
                balance,
                hold,
            ));
        }

        self.book().conclude(&tally_id)?;
        self.forward_misbehaviour(&tally_id, &conflicting);
        Ok(receipt)
    }

    /// Load Collect orders still awaiting their confirmation verdict.
    /// Already-resolved orders are skipped so repeated confirmations stay
    /// idempotent; a non-Collect order in the batch is an error.
    fn pending_collects(&self, ids: &[OrderId]) -> Result<Vec<CollectOrder>, SettlementError> {
        let mut pending = Vec::new();
        for order in self.load_orders(ids)? {
            match order {
                Order::Collect(c) => {
                    if c.deposit_status == DepositConfirmStatus::Unconfirmed {
                        pending.push(c);
                    }
                }
                other => {
                    return Err(SettlementError::InvalidOrder(format!(
                        "order {} is not a deposit order ({})",
                        other.id(),
                        other.order_type()
                    )))
                }
            }
        }
        Ok(pending)
    }
}
