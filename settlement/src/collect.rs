//! Consolidation of confirmed user deposits into an OPCU.

use crate::error::SettlementError;
use crate::flows::{CollectFlow, Flow, OrderFlow, Receipt};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_orders::{CollectOrder, DepositConfirmStatus, Order, OrderStatus, OutPoint};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::{DepositItem, DepositStore};
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{
    Amount, CuAddress, CuKind, DepositStatus, ExtAddress, OrderId, Symbol, TokenInfo, TxModel,
    ValidatorId,
};
use custos_verify::{verify_utxo_tx, ExpectedAccountTx, UtxoVerifyContext};
use tracing::{debug, info};

impl<S, A, R, E> SettlementKeeper<'_, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    /// Extract the Collect payloads of a batch, requiring a uniform symbol
    /// and the given status on every order.
    fn collect_batch(
        &self,
        order_ids: &[OrderId],
        status: OrderStatus,
    ) -> Result<Vec<CollectOrder>, SettlementError> {
        let orders = self.load_orders(order_ids)?;
        let mut batch = Vec::with_capacity(orders.len());
        for order in orders {
            match order {
                Order::Collect(c) => {
                    if c.base.status != status {
                        return Err(SettlementError::InvalidOrder(format!(
                            "order {} is {}, expected {status}",
                            c.base.id, c.base.status
                        )));
                    }
                    if c.deposit_status != DepositConfirmStatus::Confirmed {
                        return Err(SettlementError::InvalidOrder(format!(
                            "order {} deposit is unconfirmed",
                            c.base.id
                        )));
                    }
                    batch.push(c);
                }
                other => {
                    return Err(SettlementError::InvalidOrder(format!(
                        "order {} is not a collect order ({})",
                        other.id(),
                        other.order_type()
                    )))
                }
            }
        }
        let symbol = &batch
            .first()
            .ok_or_else(|| SettlementError::InvalidOrder("empty order batch".into()))?
            .base
            .symbol;
        if batch.iter().any(|c| &c.base.symbol != symbol) {
            return Err(SettlementError::InvalidOrder(
                "mixed symbols in collect batch".into(),
            ));
        }
        Ok(batch)
    }

    /// Verify a decoded collect transaction against the batch. All vouts
    /// must consolidate into the OPCU's own addresses (no payouts).
    fn verify_collect_tx(
        &self,
        opcu: &CuAddress,
        token: &TokenInfo,
        batch: &[CollectOrder],
        payload: &[u8],
        signed: bool,
        spendable: DepositStatus,
    ) -> Result<Amount, SettlementError> {
        let symbol = &batch[0].base.symbol;
        match token.tx_model {
            TxModel::Utxo => {
                let tx = if signed {
                    self.adapter
                        .query_utxo_transaction_from_signed_data(&token.chain, symbol, payload)?
                } else {
                    self.adapter
                        .query_utxo_transaction_from_data(&token.chain, symbol, payload)?
                };
                let declared: Vec<OutPoint> = batch
                    .iter()
                    .map(|c| OutPoint {
                        tx_hash: c.tx_hash.clone(),
                        index: c.index,
                    })
                    .collect();
                let mut deposits = Vec::with_capacity(batch.len());
                for c in batch {
                    deposits.push(self.ledger().get_deposit_item(
                        symbol,
                        &c.base.cu_address,
                        &c.tx_hash,
                        c.index,
                    )?);
                }
                let opcu_asset = self.ledger().get_asset(opcu)?;
                let own: Vec<ExtAddress> = opcu_asset
                    .assets
                    .iter()
                    .filter(|a| a.chain == token.chain)
                    .map(|a| a.address.clone())
                    .collect();
                let ctx = UtxoVerifyContext {
                    token,
                    own_addresses: &own,
                    asset_coins: opcu_asset.coins_of(symbol),
                    declared_vins: &declared,
                    deposits: &deposits,
                    spendable_status: spendable,
                    threshold: token.collect_threshold,
                };
                let v = verify_utxo_tx(&ctx, &[], &tx)?;
                if signed {
                    let input_addresses: Vec<ExtAddress> =
                        deposits.iter().map(|d| d.ext_address.clone()).collect();
                    let ok = self.adapter.verify_utxo_signed_transaction(
                        &token.chain,
                        symbol,
                        &input_addresses,
                        payload,
                    )?;
                    if !ok {
                        return Err(SettlementError::InvalidTx(
                            "signature verification failed".into(),
                        ));
                    }
                }
                Ok(v.cost_fee)
            }
            TxModel::Account => {
                let tx = if signed {
                    self.adapter
                        .query_account_transaction_from_signed_data(&token.chain, symbol, payload)?
                } else {
                    self.adapter
                        .query_account_transaction_from_data(&token.chain, symbol, payload)?
                };
                let opcu_asset = self.ledger().get_asset(opcu)?;
                let to = opcu_asset
                    .current_address(&token.chain)
                    .map(|a| a.address.clone())
                    .ok_or_else(|| SettlementError::InvalidAddress(opcu.to_string()))?;
                let source = batch[0].ext_address.clone();
                let expected = ExpectedAccountTx {
                    token,
                    to: &to,
                    amount: batch[0].amount,
                    from: if signed { Some(&source) } else { None },
                    nonce: None,
                };
                custos_verify::verify_account_tx(&expected, &tx, batch.len())?;
                if signed {
                    let ok = self.adapter.verify_account_signed_transaction(
                        &token.chain,
                        symbol,
                        &source,
                        payload,
                    )?;
                    if !ok {
                        return Err(SettlementError::InvalidTx(
                            "signature verification failed".into(),
                        ));
                    }
                }
                Ok(Amount::new(tx.gas_limit.saturating_mul(tx.gas_price.raw())))
            }
        }
    }

    /// Bind a batch of confirmed deposits to a consolidation transaction
    /// and move the batch to `WaitSign`, holding the source amounts.
    pub fn collect_wait_sign(
        &self,
        opcu: &CuAddress,
        order_ids: &[OrderId],
        raw_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let batch = self.collect_batch(order_ids, OrderStatus::Begin)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        if !token.send_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "send disabled for {symbol}"
            )));
        }
        for c in &batch {
            if c.amount < token.collect_threshold {
                return Err(SettlementError::AmountError(format!(
                    "collect {} below threshold {}",
                    c.amount, token.collect_threshold
                )));
            }
        }

        let cost_fee =
            self.verify_collect_tx(opcu, &token, &batch, raw_data, false, DepositStatus::WaitCollect)?;

        let ledger = self.ledger();
        let mut receipt = Receipt::empty();
        for c in &batch {
            let cu = &c.base.cu_address;
            let before = ledger.get_asset(cu)?;
            ledger.hold_asset_coins(cu, &symbol, c.amount)?;
            ledger.set_deposit_status(&symbol, cu, &c.tx_hash, c.index, DepositStatus::InProcess)?;

            let mut updated = c.clone();
            updated.collect_to = Some(opcu.clone());
            updated.raw_data = raw_data.to_vec();
            updated.vins = vec![OutPoint {
                tx_hash: c.tx_hash.clone(),
                index: c.index,
            }];
            updated.cost_fee = cost_fee;
            let mut order = Order::Collect(updated);
            self.orders().advance(&mut order, OrderStatus::WaitSign)?;

            let after = ledger.get_asset(cu)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: cu.clone(),
                order_id: c.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
            receipt.push(Self::balance_flow(
                cu,
                &symbol,
                before.coins_of(&symbol),
                before.hold_of(&symbol),
                after.coins_of(&symbol),
                after.hold_of(&symbol),
            ));
        }
        debug!(%opcu, %symbol, batch = batch.len(), "collect batch moved to WaitSign");
        Ok(receipt)
    }

    /// Attach the signed consolidation payload after re-verification.
    pub fn collect_sign_finish(
        &self,
        opcu: &CuAddress,
        order_ids: &[OrderId],
        signed_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let batch = self.collect_batch(order_ids, OrderStatus::WaitSign)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        for c in &batch {
            if c.collect_to.as_ref() != Some(opcu) {
                return Err(SettlementError::InvalidOrder(format!(
                    "order {} is bound to a different opcu",
                    c.base.id
                )));
            }
        }

        self.verify_collect_tx(opcu, &token, &batch, signed_data, true, DepositStatus::InProcess)?;

        let mut receipt = Receipt::empty();
        for c in &batch {
            let mut updated = c.clone();
            updated.signed_tx = signed_data.to_vec();
            let mut order = Order::Collect(updated);
            self.orders().advance(&mut order, OrderStatus::SignFinish)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: c.base.cu_address.clone(),
                order_id: c.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
        }
        Ok(receipt)
    }

    /// Quorum-gated settlement of a broadcast consolidation.
    ///
    /// On quorum: source CUs are debited, their items consumed, the OPCU
    /// credited with the collected total net of the cost fee, and the
    /// change-back outputs minted as fresh `Confirmed` items.
    pub fn collect_finish(
        &self,
        validator: &ValidatorId,
        order_ids: &[OrderId],
        settle_tx_hash: &str,
    ) -> Result<Receipt, SettlementError> {
        let tally_id = Self::tally_id(order_ids)?;
        let orders = self.load_orders(order_ids)?;
        if orders.iter().all(|o| o.status() == OrderStatus::Finish) {
            return Ok(Receipt::empty());
        }

        let batch = self.collect_batch(order_ids, OrderStatus::SignFinish)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        let opcu = batch[0]
            .collect_to
            .clone()
            .ok_or_else(|| SettlementError::InvalidOrder("collect batch has no opcu".into()))?;

        let digest =
            Self::confirm_digest("collect_finish", order_ids, settle_tx_hash.as_bytes());
        let conflicting = match self
            .book()
            .submit(&tally_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%tally_id, votes, "collect confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%tally_id, votes, %opcu, "collect reached quorum");
                conflicting
            }
        };

        let ledger = self.ledger();
        let total = Self::checked_total(batch.iter().map(|c| c.amount))?;
        let cost_fee = batch[0].cost_fee;
        let collected = total
            .checked_sub(cost_fee)
            .ok_or_else(|| SettlementError::AmountError("cost fee exceeds collected total".into()))?;

        let opcu_before = ledger.ensure_asset(&opcu)?;
        let mut receipt = Receipt::empty();
        for c in &batch {
            let cu = &c.base.cu_address;
            let before = ledger.get_asset(cu)?;
            ledger.settle_asset_hold(cu, &symbol, c.amount)?;
            ledger.consume_deposit_item(&symbol, cu, &c.tx_hash, c.index)?;

            let mut updated = c.clone();
            updated.settle_tx_hash = settle_tx_hash.to_string();
            let mut order = Order::Collect(updated);
            self.orders().advance(&mut order, OrderStatus::Finish)?;

            let after = ledger.get_asset(cu)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: cu.clone(),
                order_id: c.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
            receipt.push(Self::balance_flow(
                cu,
                &symbol,
                before.coins_of(&symbol),
                before.hold_of(&symbol),
                after.coins_of(&symbol),
                after.hold_of(&symbol),
            ));
        }

        ledger.add_asset_coins(&opcu, &symbol, collected)?;
        ledger.record_gas(&opcu, &token.chain, cost_fee, Amount::ZERO)?;
        self.mint_collect_change(&opcu, &symbol, &token, &batch[0].signed_tx, settle_tx_hash)?;

        let opcu_after = ledger.get_asset(&opcu)?;
        receipt.push(Flow::Collect(CollectFlow {
            opcu: opcu.clone(),
            symbol: symbol.clone(),
            total_amount: total,
            cost_fee,
        }));
        receipt.push(Self::balance_flow(
            &opcu,
            &symbol,
            opcu_before.coins_of(&symbol),
            opcu_before.hold_of(&symbol),
            opcu_after.coins_of(&symbol),
            opcu_after.hold_of(&symbol),
        ));

        self.book().conclude(&tally_id)?;
        self.forward_misbehaviour(&tally_id, &conflicting);
        Ok(receipt)
    }

    /// Mint `Confirmed` deposit items for the settled transaction's outputs
    /// landing on the OPCU's own addresses.
    pub(crate) fn mint_collect_change(
        &self,
        opcu: &CuAddress,
        symbol: &Symbol,
        token: &TokenInfo,
        signed_tx: &[u8],
        settle_tx_hash: &str,
    ) -> Result<(), SettlementError> {
        let ledger = self.ledger();
        let asset = ledger.get_asset(opcu)?;
        match token.tx_model {
            TxModel::Utxo => {
                let tx = self.adapter.query_utxo_transaction_from_signed_data(
                    &token.chain,
                    symbol,
                    signed_tx,
                )?;
                for (i, vout) in tx.vouts.iter().enumerate() {
                    if asset.owns_address(&token.chain, &vout.address) {
                        ledger.new_deposit_item(DepositItem {
                            symbol: symbol.clone(),
                            cu_address: opcu.clone(),
                            tx_hash: settle_tx_hash.to_string(),
                            index: i as u64,
                            amount: vout.amount,
                            ext_address: vout.address.clone(),
                            memo: String::new(),
                            status: DepositStatus::Confirmed,
                        })?;
                    }
                }
            }
            // Account balances carry no outpoints, so there is nothing to mint.
            TxModel::Account => {}
        }
        Ok(())
    }
}
