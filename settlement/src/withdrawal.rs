//! Outbound user withdrawals.

use crate::error::SettlementError;
use crate::flows::{Flow, OrderFlow, Receipt, WithdrawalFlow};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_ledger::LedgerError;
use custos_orders::{Order, OrderBase, OrderStatus, OutPoint, WithdrawalOrder};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::DepositStore;
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{
    Amount, CuAddress, CuKind, DepositStatus, ExtAddress, OrderId, Symbol, TokenInfo, TxModel,
    ValidatorId,
};
use custos_verify::{verify_utxo_tx, ExpectedAccountTx, ExpectedPayout, UtxoVerifyContext};
use tracing::{debug, info};

/// Everything the wait-sign/sign-finish pipeline derives from a decoded
/// withdrawal transaction.
struct WithdrawalTxCheck {
    cost_fee: Amount,
    /// The amount the OPCU must hold for the in-flight settlement.
    opcu_hold: Amount,
    /// Consumed outpoints (UTXO model only).
    vins: Vec<OutPoint>,
}

impl<S, A, R, E> SettlementKeeper<'_, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    /// Create a withdrawal order, holding `amount + gas_fee` of the user's
    /// coins.
    pub fn withdrawal(
        &self,
        cu: &CuAddress,
        to_address: &str,
        order_id: OrderId,
        symbol: &Symbol,
        amount: Amount,
        gas_fee: Amount,
    ) -> Result<Receipt, SettlementError> {
        let token = self.token(symbol)?;
        if !token.withdrawal_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "withdrawal disabled for {symbol}"
            )));
        }
        self.require_cu_of_kind(cu, CuKind::User)?;
        let to = self.adapter.valid_address(&token.chain, symbol, to_address)?;

        if self.orders().exists(&order_id)? {
            return Err(SettlementError::InvalidOrder(format!(
                "order id {order_id} already used"
            )));
        }
        if amount < token.withdrawal_threshold {
            return Err(SettlementError::AmountError(format!(
                "withdrawal {amount} below threshold {}",
                token.withdrawal_threshold
            )));
        }
        let min_fee = amount
            .checked_mul_bps(token.withdrawal_fee_rate_bps)
            .ok_or_else(|| SettlementError::AmountError("fee computation overflow".into()))?;
        if gas_fee < min_fee {
            return Err(SettlementError::InsufficientFee {
                needed: min_fee.raw(),
                provided: gas_fee.raw(),
            });
        }

        let total = amount
            .checked_add(gas_fee)
            .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?;
        let ledger = self.ledger();
        let before = ledger.get_cu(cu)?;
        ledger.hold_coins(cu, total).map_err(|e| match e {
            LedgerError::InsufficientCoins { needed, available } => {
                SettlementError::InsufficientCoins { needed, available }
            }
            other => other.into(),
        })?;

        let order = Order::Withdrawal(WithdrawalOrder::new(
            OrderBase::new(order_id, cu.clone(), symbol.clone(), self.height),
            to.clone(),
            amount,
            gas_fee,
        ));
        self.orders().new_order(&order)?;
        debug!(%order_id, %cu, %symbol, %amount, %gas_fee, "withdrawal order created");

        let after = ledger.get_cu(cu)?;
        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: cu.clone(),
            order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        receipt.push(Flow::Withdrawal(WithdrawalFlow {
            cu: cu.clone(),
            symbol: symbol.clone(),
            to_address: to,
            amount,
            gas_fee,
        }));
        receipt.push(Self::balance_flow(
            cu,
            symbol,
            before.coins,
            before.coins_hold,
            after.coins,
            after.coins_hold,
        ));
        Ok(receipt)
    }

    fn withdrawal_batch(
        &self,
        order_ids: &[OrderId],
        status: OrderStatus,
    ) -> Result<Vec<WithdrawalOrder>, SettlementError> {
        let orders = self.load_orders(order_ids)?;
        let mut batch = Vec::with_capacity(orders.len());
        for order in orders {
            match order {
                Order::Withdrawal(w) => {
                    if w.base.status != status {
                        return Err(SettlementError::InvalidOrder(format!(
                            "order {} is {}, expected {status}",
                            w.base.id, w.base.status
                        )));
                    }
                    batch.push(w);
                }
                other => {
                    return Err(SettlementError::InvalidOrder(format!(
                        "order {} is not a withdrawal order ({})",
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
        if batch.iter().any(|w| &w.base.symbol != symbol) {
            return Err(SettlementError::InvalidOrder(
                "mixed symbols in withdrawal batch".into(),
            ));
        }
        Ok(batch)
    }

    fn verify_withdrawal_tx(
        &self,
        opcu: &CuAddress,
        token: &TokenInfo,
        batch: &[WithdrawalOrder],
        payload: &[u8],
        signed: bool,
        spendable: DepositStatus,
    ) -> Result<WithdrawalTxCheck, SettlementError> {
        let symbol = &batch[0].base.symbol;
        let ledger = self.ledger();
        let opcu_asset = ledger.get_asset(opcu)?;
        match token.tx_model {
            TxModel::Utxo => {
                let tx = if signed {
                    self.adapter
                        .query_utxo_transaction_from_signed_data(&token.chain, symbol, payload)?
                } else {
                    self.adapter
                        .query_utxo_transaction_from_data(&token.chain, symbol, payload)?
                };
                // The signer chooses the inputs; they must all be the OPCU's
                // own spendable items.
                let declared: Vec<OutPoint> = tx
                    .vins
                    .iter()
                    .map(|v| OutPoint {
                        tx_hash: v.tx_hash.clone(),
                        index: v.index,
                    })
                    .collect();
                let deposits = self.store.list_items(symbol, opcu)?;
                let own: Vec<ExtAddress> = opcu_asset
                    .assets
                    .iter()
                    .filter(|a| a.chain == token.chain)
                    .map(|a| a.address.clone())
                    .collect();
                let payouts: Vec<ExpectedPayout> = batch
                    .iter()
                    .map(|w| ExpectedPayout {
                        order_id: w.base.id,
                        to: w.to_address.clone(),
                        amount: w.amount,
                    })
                    .collect();
                let ctx = UtxoVerifyContext {
                    token,
                    own_addresses: &own,
                    asset_coins: opcu_asset.coins_of(symbol),
                    declared_vins: &declared,
                    deposits: &deposits,
                    spendable_status: spendable,
                    threshold: token.withdrawal_threshold,
                };
                let v = verify_utxo_tx(&ctx, &payouts, &tx)?;
                if signed {
                    let input_addresses: Vec<ExtAddress> =
                        tx.vins.iter().map(|i| i.address.clone()).collect();
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
                let opcu_hold = v
                    .total_payout
                    .checked_add(v.cost_fee)
                    .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?;
                Ok(WithdrawalTxCheck {
                    cost_fee: v.cost_fee,
                    opcu_hold,
                    vins: declared,
                })
            }
            TxModel::Account => {
                let tx = if signed {
                    self.adapter
                        .query_account_transaction_from_signed_data(&token.chain, symbol, payload)?
                } else {
                    self.adapter
                        .query_account_transaction_from_data(&token.chain, symbol, payload)?
                };
                let current = opcu_asset
                    .current_address(&token.chain)
                    .ok_or_else(|| SettlementError::InvalidAddress(opcu.to_string()))?;
                let from = current.address.clone();
                let w = &batch[0];
                let expected = ExpectedAccountTx {
                    token,
                    to: &w.to_address,
                    amount: w.amount,
                    from: if signed { Some(&from) } else { None },
                    nonce: Some(current.nonce),
                };
                custos_verify::verify_account_tx(&expected, &tx, batch.len())?;
                if signed {
                    let ok = self.adapter.verify_account_signed_transaction(
                        &token.chain,
                        symbol,
                        &from,
                        payload,
                    )?;
                    if !ok {
                        return Err(SettlementError::InvalidTx(
                            "signature verification failed".into(),
                        ));
                    }
                }
                Ok(WithdrawalTxCheck {
                    cost_fee: Amount::new(tx.gas_limit.saturating_mul(tx.gas_price.raw())),
                    opcu_hold: w.amount,
                    vins: Vec::new(),
                })
            }
        }
    }

    /// Bind a batch of withdrawal orders to one foreign transaction funded
    /// by `opcu` and move the batch to `WaitSign`.
    ///
    /// The OPCU's consumed coins are held and its send capability disabled
    /// until the settlement concludes.
    pub fn withdrawal_wait_sign(
        &self,
        opcu: &CuAddress,
        order_ids: &[OrderId],
        raw_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let batch = self.withdrawal_batch(order_ids, OrderStatus::Begin)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        if !token.send_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "send disabled for {symbol}"
            )));
        }
        let ledger = self.ledger();
        let current_enabled = ledger
            .get_asset(opcu)?
            .current_address(&token.chain)
            .is_some_and(|a| a.enable_send_tx);
        if !current_enabled {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "{opcu} send is disabled on {}",
                token.chain
            )));
        }

        let check =
            self.verify_withdrawal_tx(opcu, &token, &batch, raw_data, false, DepositStatus::Confirmed)?;

        let before = ledger.get_asset(opcu)?;
        ledger.hold_asset_coins(opcu, &symbol, check.opcu_hold)?;
        for vin in &check.vins {
            ledger.set_deposit_status(&symbol, opcu, &vin.tx_hash, vin.index, DepositStatus::InProcess)?;
        }
        ledger.set_send_enabled(opcu, &token.chain, false)?;

        let mut receipt = Receipt::empty();
        for w in &batch {
            let mut updated = w.clone();
            updated.opcu = Some(opcu.clone());
            updated.raw_data = raw_data.to_vec();
            updated.vins = check.vins.clone();
            updated.cost_fee = check.cost_fee;
            let mut order = Order::Withdrawal(updated);
            self.orders().advance(&mut order, OrderStatus::WaitSign)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: w.base.cu_address.clone(),
                order_id: w.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
        }
        let after = ledger.get_asset(opcu)?;
        receipt.push(Self::balance_flow(
            opcu,
            &symbol,
            before.coins_of(&symbol),
            before.hold_of(&symbol),
            after.coins_of(&symbol),
            after.hold_of(&symbol),
        ));
        debug!(%opcu, %symbol, batch = batch.len(), "withdrawal batch moved to WaitSign");
        Ok(receipt)
    }

    /// Attach the signed withdrawal payload after re-verification.
    pub fn withdrawal_sign_finish(
        &self,
        opcu: &CuAddress,
        order_ids: &[OrderId],
        signed_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let batch = self.withdrawal_batch(order_ids, OrderStatus::WaitSign)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        for w in &batch {
            if w.opcu.as_ref() != Some(opcu) {
                return Err(SettlementError::InvalidOrder(format!(
                    "order {} is bound to a different opcu",
                    w.base.id
                )));
            }
        }

        self.verify_withdrawal_tx(opcu, &token, &batch, signed_data, true, DepositStatus::InProcess)?;

        let mut receipt = Receipt::empty();
        for w in &batch {
            let mut updated = w.clone();
            updated.signed_tx = signed_data.to_vec();
            let mut order = Order::Withdrawal(updated);
            self.orders().advance(&mut order, OrderStatus::SignFinish)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: w.base.cu_address.clone(),
                order_id: w.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
        }
        Ok(receipt)
    }

    /// Quorum-gated settlement of a broadcast withdrawal batch.
    ///
    /// On quorum: each sender's hold is consumed exactly once, the OPCU's
    /// held coins are debited, its gas accounting updated, its send
    /// capability restored, and change-back outputs minted `Confirmed`.
    pub fn withdrawal_finish(
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

        let batch = self.withdrawal_batch(order_ids, OrderStatus::SignFinish)?;
        let symbol = batch[0].base.symbol.clone();
        let token = self.token(&symbol)?;
        let opcu = batch[0]
            .opcu
            .clone()
            .ok_or_else(|| SettlementError::InvalidOrder("withdrawal batch has no opcu".into()))?;

        let digest =
            Self::confirm_digest("withdrawal_finish", order_ids, settle_tx_hash.as_bytes());
        let conflicting = match self
            .book()
            .submit(&tally_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%tally_id, votes, "withdrawal confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%tally_id, votes, %opcu, "withdrawal reached quorum");
                conflicting
            }
        };

        let ledger = self.ledger();
        let cost_fee = batch[0].cost_fee;
        let total_payout = Self::checked_total(batch.iter().map(|w| w.amount))?;
        let gas_received = Self::checked_total(batch.iter().map(|w| w.gas_fee))?;
        let opcu_hold = match token.tx_model {
            TxModel::Utxo => total_payout
                .checked_add(cost_fee)
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?,
            TxModel::Account => total_payout,
        };

        let opcu_before = ledger.get_asset(&opcu)?;
        let mut receipt = Receipt::empty();
        for w in &batch {
            let cu = &w.base.cu_address;
            let total = w
                .amount
                .checked_add(w.gas_fee)
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?;
            let before = ledger.get_cu(cu)?;
            ledger.settle_hold(cu, total)?;

            let mut updated = w.clone();
            updated.settle_tx_hash = settle_tx_hash.to_string();
            let mut order = Order::Withdrawal(updated);
            self.orders().advance(&mut order, OrderStatus::Finish)?;

            let after = ledger.get_cu(cu)?;
            receipt.push(Flow::Order(OrderFlow {
                cu: cu.clone(),
                order_id: w.base.id,
                order_type: order.order_type(),
                status: order.status(),
            }));
            receipt.push(Flow::Withdrawal(WithdrawalFlow {
                cu: cu.clone(),
                symbol: symbol.clone(),
                to_address: w.to_address.clone(),
                amount: w.amount,
                gas_fee: w.gas_fee,
            }));
            receipt.push(Self::balance_flow(
                cu,
                &symbol,
                before.coins,
                before.coins_hold,
                after.coins,
                after.coins_hold,
            ));
        }

        ledger.settle_asset_hold(&opcu, &symbol, opcu_hold)?;
        for vin in &batch[0].vins {
            ledger.consume_deposit_item(&symbol, &opcu, &vin.tx_hash, vin.index)?;
        }
        if token.tx_model == TxModel::Utxo {
            self.mint_collect_change(&opcu, &symbol, &token, &batch[0].signed_tx, settle_tx_hash)?;
        } else {
            ledger.bump_nonce(&opcu, &token.chain)?;
        }
        ledger.record_gas(&opcu, &token.chain, cost_fee, gas_received)?;
        ledger.set_send_enabled(&opcu, &token.chain, true)?;

        let opcu_after = ledger.get_asset(&opcu)?;
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
}
