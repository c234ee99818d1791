//! Native-gas top-ups from an OPCU to under-funded addresses.

use crate::error::SettlementError;
use crate::flows::{Flow, OrderFlow, Receipt, SysTransferFlow};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_orders::{Order, OrderBase, OrderStatus, OrderType, SysTransferOrder};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::AssetStore;
use custos_store::cu::CuStore;
use custos_store::deposit::DepositStore;
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{Amount, CuAddress, CuKind, OrderId, Symbol, ValidatorId};
use custos_verify::ExpectedAccountTx;
use tracing::{debug, info};

/// Ceiling on in-flight top-ups per `(recipient, symbol)` absent fresh
/// demand.
pub const MAX_SYS_TRANSFER_NUM: usize = 3;

impl<S, A, R, E> SettlementKeeper<'_, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    fn sys_transfer_order(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<SysTransferOrder, SettlementError> {
        match self.load_orders(std::slice::from_ref(order_id))?.remove(0) {
            Order::SysTransfer(s) => {
                if s.base.status != status {
                    return Err(SettlementError::InvalidOrder(format!(
                        "order {} is {}, expected {status}",
                        s.base.id, s.base.status
                    )));
                }
                Ok(s)
            }
            other => Err(SettlementError::InvalidOrder(format!(
                "order {} is not a sys transfer order ({})",
                other.id(),
                other.order_type()
            ))),
        }
    }

    /// Create a gas top-up order from `opcu` to `to_cu`'s signing address.
    ///
    /// Top-ups exist only to unblock pending settlement: there must be an
    /// in-flight order for the symbol touching the recipient, and no more
    /// than [`MAX_SYS_TRANSFER_NUM`] top-ups may already be in flight.
    pub fn sys_transfer(
        &self,
        opcu: &CuAddress,
        to_cu: &CuAddress,
        order_id: OrderId,
        symbol: &Symbol,
    ) -> Result<Receipt, SettlementError> {
        let token = self.token(symbol)?;
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let recipient = self.require_cu(to_cu)?;

        if self.orders().exists(&order_id)? {
            return Err(SettlementError::InvalidOrder(format!(
                "order id {order_id} already used"
            )));
        }

        let amount = match recipient.kind {
            CuKind::User => token.sys_transfer_amount,
            CuKind::Op => token.op_cu_sys_transfer_amount,
        };
        let ledger = self.ledger();
        let to_entry = ledger
            .get_asset(to_cu)?
            .current_address(&token.chain)
            .cloned()
            .ok_or_else(|| SettlementError::InvalidAddress(to_cu.to_string()))?;
        if to_entry.gas_remained >= amount {
            return Err(SettlementError::InvalidOrder(format!(
                "{to_cu} is not under-funded on {}",
                token.chain
            )));
        }

        let mut demand = false;
        let mut in_flight = 0usize;
        for id in self.orders().order_ids()? {
            let order = self.orders().get(&id)?;
            if order.base().symbol != *symbol || order.status() == OrderStatus::Finish {
                continue;
            }
            match order.order_type() {
                OrderType::SysTransfer => {
                    if let Order::SysTransfer(s) = &order {
                        if &s.to_cu == to_cu {
                            in_flight += 1;
                        }
                    }
                }
                OrderType::KeyGen => {}
                _ => {
                    if order.base().cu_address == *to_cu {
                        demand = true;
                    }
                }
            }
        }
        if !demand {
            return Err(SettlementError::InvalidOrder(format!(
                "no pending order of {symbol} needs gas at {to_cu}"
            )));
        }
        if in_flight >= MAX_SYS_TRANSFER_NUM {
            return Err(SettlementError::InvalidOrder(format!(
                "{in_flight} top-ups already in flight for {to_cu}"
            )));
        }

        let order = Order::SysTransfer(SysTransferOrder {
            base: OrderBase::new(order_id, opcu.clone(), symbol.clone(), self.height),
            to_cu: to_cu.clone(),
            to_address: to_entry.address.clone(),
            amount,
            raw_data: Vec::new(),
            signed_tx: Vec::new(),
            settle_tx_hash: String::new(),
            cost_fee: Amount::ZERO,
        });
        self.orders().new_order(&order)?;
        debug!(%order_id, %opcu, %to_cu, %amount, "sys transfer order created");

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        Ok(receipt)
    }

    /// Bind the top-up to a raw native transfer and move to `WaitSign`.
    pub fn sys_transfer_wait_sign(
        &self,
        opcu: &CuAddress,
        order_id: &OrderId,
        raw_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let s = self.sys_transfer_order(order_id, OrderStatus::Begin)?;
        let token = self.token(&s.base.symbol)?;

        let tx = self
            .adapter
            .query_account_transaction_from_data(&token.chain, &s.base.symbol, raw_data)?;
        let sender_nonce = self
            .ledger()
            .get_asset(opcu)?
            .current_address(&token.chain)
            .map(|a| a.nonce)
            .ok_or_else(|| SettlementError::InvalidAddress(opcu.to_string()))?;
        let expected = ExpectedAccountTx {
            token: &token,
            to: &s.to_address,
            amount: s.amount,
            from: None,
            nonce: Some(sender_nonce),
        };
        custos_verify::verify_account_tx(&expected, &tx, 1)?;

        let mut updated = s.clone();
        updated.raw_data = raw_data.to_vec();
        updated.cost_fee = Amount::new(tx.gas_limit.saturating_mul(tx.gas_price.raw()));
        let mut order = Order::SysTransfer(updated);
        self.orders().advance(&mut order, OrderStatus::WaitSign)?;

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id: *order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        Ok(receipt)
    }

    /// Attach the signed top-up payload after re-verification.
    pub fn sys_transfer_sign_finish(
        &self,
        opcu: &CuAddress,
        order_id: &OrderId,
        signed_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let s = self.sys_transfer_order(order_id, OrderStatus::WaitSign)?;
        let token = self.token(&s.base.symbol)?;

        let tx = self.adapter.query_account_transaction_from_signed_data(
            &token.chain,
            &s.base.symbol,
            signed_data,
        )?;
        let ledger = self.ledger();
        let current = ledger
            .get_asset(opcu)?
            .current_address(&token.chain)
            .cloned()
            .ok_or_else(|| SettlementError::InvalidAddress(opcu.to_string()))?;
        let expected = ExpectedAccountTx {
            token: &token,
            to: &s.to_address,
            amount: s.amount,
            from: Some(&current.address),
            nonce: Some(current.nonce),
        };
        custos_verify::verify_account_tx(&expected, &tx, 1)?;
        let ok = self.adapter.verify_account_signed_transaction(
            &token.chain,
            &s.base.symbol,
            &current.address,
            signed_data,
        )?;
        if !ok {
            return Err(SettlementError::InvalidTx(
                "signature verification failed".into(),
            ));
        }

        let mut updated = s.clone();
        updated.signed_tx = signed_data.to_vec();
        let mut order = Order::SysTransfer(updated);
        self.orders().advance(&mut order, OrderStatus::SignFinish)?;

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id: *order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        Ok(receipt)
    }

    /// Quorum-gated settlement of a broadcast top-up: the recipient's
    /// `gas_remained` rises, the OPCU's gas spend is booked, and an OPCU
    /// recipient regains its send capability.
    pub fn sys_transfer_finish(
        &self,
        validator: &ValidatorId,
        order_id: &OrderId,
        settle_tx_hash: &str,
    ) -> Result<Receipt, SettlementError> {
        let ids = [*order_id];
        let order = self.load_orders(&ids)?.remove(0);
        if order.status() == OrderStatus::Finish {
            return Ok(Receipt::empty());
        }
        let s = self.sys_transfer_order(order_id, OrderStatus::SignFinish)?;
        let token = self.token(&s.base.symbol)?;
        let opcu = s.base.cu_address.clone();

        let digest = Self::confirm_digest("sys_transfer_finish", &ids, settle_tx_hash.as_bytes());
        let conflicting = match self
            .book()
            .submit(order_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%order_id, votes, "sys transfer confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%order_id, votes, %opcu, "sys transfer reached quorum");
                conflicting
            }
        };

        let ledger = self.ledger();
        ledger.add_gas_remained(&s.to_cu, &token.chain, &s.to_address, s.amount)?;
        let recipient_kind = ledger.get_cu(&s.to_cu)?.kind;
        if recipient_kind == CuKind::Op {
            ledger.set_send_enabled(&s.to_cu, &token.chain, true)?;
        }
        let gas_spent = s
            .amount
            .checked_add(s.cost_fee)
            .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?;
        ledger.record_gas(&opcu, &token.chain, gas_spent, Amount::ZERO)?;
        ledger.bump_nonce(&opcu, &token.chain)?;

        let mut updated = s.clone();
        updated.settle_tx_hash = settle_tx_hash.to_string();
        let mut order = Order::SysTransfer(updated);
        self.orders().advance(&mut order, OrderStatus::Finish)?;

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id: *order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        receipt.push(Flow::SysTransfer(SysTransferFlow {
            opcu,
            to_cu: s.to_cu.clone(),
            symbol: s.base.symbol.clone(),
            amount: s.amount,
        }));

        self.book().conclude(order_id)?;
        self.forward_misbehaviour(order_id, &conflicting);
        Ok(receipt)
    }
}
