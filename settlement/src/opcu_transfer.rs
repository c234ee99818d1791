//! Epoch migration of an OPCU's holdings to its new signing address.

use crate::error::SettlementError;
use crate::flows::{Flow, OpcuAssetTransferFlow, OrderFlow, Receipt};
use crate::keeper::SettlementKeeper;
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_orders::{OpcuAssetTransferOrder, Order, OrderBase, OrderStatus, OutPoint, TransferItem};
use custos_quorum::{ConfirmOutcome, EvidenceKeeper};
use custos_store::asset::{AssetAddress, AssetStore, CuAsset};
use custos_store::cu::CuStore;
use custos_store::deposit::DepositStore;
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{
    Amount, CuAddress, CuKind, DepositStatus, ExtAddress, MigrationStatus, OrderId, Symbol,
    TokenInfo, TxModel, ValidatorId,
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
    fn migration_order(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<OpcuAssetTransferOrder, SettlementError> {
        match self.load_orders(std::slice::from_ref(order_id))?.remove(0) {
            Order::OpcuAssetTransfer(m) => {
                if m.base.status != status {
                    return Err(SettlementError::InvalidOrder(format!(
                        "order {} is {}, expected {status}",
                        m.base.id, m.base.status
                    )));
                }
                Ok(m)
            }
            other => Err(SettlementError::InvalidOrder(format!(
                "order {} is not an asset transfer order ({})",
                other.id(),
                other.order_type()
            ))),
        }
    }

    /// The signing address the OPCU retired at the last rotation.
    fn retired_address(
        asset: &CuAsset,
        token: &TokenInfo,
    ) -> Result<AssetAddress, SettlementError> {
        asset
            .address_at_epoch(&token.chain, asset.asset_pubkey_epoch)
            .cloned()
            .ok_or_else(|| {
                SettlementError::InvalidAddress(format!(
                    "no retired address on {} to migrate from",
                    token.chain
                ))
            })
    }

    /// Items still sitting on the retired address, eligible for migration.
    fn eligible_items(
        &self,
        opcu: &CuAddress,
        symbol: &Symbol,
        retired: &ExtAddress,
    ) -> Result<Vec<TransferItem>, SettlementError> {
        Ok(self
            .store
            .list_items(symbol, opcu)?
            .into_iter()
            .filter(|i| i.status == DepositStatus::Confirmed && i.ext_address.eq_canonical(retired))
            .map(|i| TransferItem {
                tx_hash: i.tx_hash,
                index: i.index,
                amount: i.amount,
            })
            .collect())
    }

    /// Create a migration order moving the OPCU's full holdings of `symbol`
    /// from the retired signing address to the current-epoch address.
    ///
    /// Allowed only while a rotation is in progress, and the proposed item
    /// set must cover every eligible item exactly — no partial migration.
    pub fn opcu_asset_transfer(
        &self,
        opcu: &CuAddress,
        order_id: OrderId,
        symbol: &Symbol,
        to_address: &str,
        items: &[TransferItem],
    ) -> Result<Receipt, SettlementError> {
        let token = self.token(symbol)?;
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        if self.orders().exists(&order_id)? {
            return Err(SettlementError::InvalidOrder(format!(
                "order id {order_id} already used"
            )));
        }

        let ledger = self.ledger();
        let asset = ledger.get_asset(opcu)?;
        if asset.migration_status != MigrationStatus::Begin {
            return Err(SettlementError::TransactionNotEnabled(format!(
                "{opcu} has no migration in progress"
            )));
        }
        let to = self.adapter.valid_address(&token.chain, symbol, to_address)?;
        let current = asset
            .current_address(&token.chain)
            .ok_or_else(|| SettlementError::InvalidAddress(opcu.to_string()))?;
        if !current.address.eq_canonical(&to) {
            return Err(SettlementError::InvalidAddress(format!(
                "{to} is not the current-epoch address"
            )));
        }

        if token.tx_model == TxModel::Utxo {
            let retired = Self::retired_address(&asset, &token)?;
            let mut eligible = self.eligible_items(opcu, symbol, &retired.address)?;
            let mut proposed = items.to_vec();
            let key = |i: &TransferItem| (i.tx_hash.clone(), i.index, i.amount);
            eligible.sort_by_key(key);
            proposed.sort_by_key(key);
            if proposed != eligible {
                return Err(SettlementError::InvalidTx(
                    "item set must cover all eligible items exactly".into(),
                ));
            }
        } else if !items.is_empty() {
            return Err(SettlementError::InvalidTx(
                "account migration carries no item set".into(),
            ));
        }

        let order = Order::OpcuAssetTransfer(OpcuAssetTransferOrder {
            base: OrderBase::new(order_id, opcu.clone(), symbol.clone(), self.height),
            to_address: to,
            items: items.to_vec(),
            raw_data: Vec::new(),
            signed_tx: Vec::new(),
            settle_tx_hash: String::new(),
            cost_fee: Amount::ZERO,
        });
        self.orders().new_order(&order)?;
        debug!(%order_id, %opcu, %symbol, "migration order created");

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        Ok(receipt)
    }

    fn verify_migration_tx(
        &self,
        opcu: &CuAddress,
        token: &TokenInfo,
        m: &OpcuAssetTransferOrder,
        payload: &[u8],
        signed: bool,
        spendable: DepositStatus,
    ) -> Result<Amount, SettlementError> {
        let symbol = &m.base.symbol;
        let ledger = self.ledger();
        let asset = ledger.get_asset(opcu)?;
        match token.tx_model {
            TxModel::Utxo => {
                let tx = if signed {
                    self.adapter
                        .query_utxo_transaction_from_signed_data(&token.chain, symbol, payload)?
                } else {
                    self.adapter
                        .query_utxo_transaction_from_data(&token.chain, symbol, payload)?
                };
                let declared: Vec<OutPoint> = m
                    .items
                    .iter()
                    .map(|i| OutPoint {
                        tx_hash: i.tx_hash.clone(),
                        index: i.index,
                    })
                    .collect();
                let deposits = self.store.list_items(symbol, opcu)?;
                // Only the current-epoch address may receive.
                let own = vec![m.to_address.clone()];
                let ctx = UtxoVerifyContext {
                    token,
                    own_addresses: &own,
                    asset_coins: asset.coins_of(symbol),
                    declared_vins: &declared,
                    deposits: &deposits,
                    spendable_status: spendable,
                    threshold: Amount::ZERO,
                };
                let v = verify_utxo_tx(&ctx, &[], &tx)?;
                if signed {
                    let retired = Self::retired_address(&asset, token)?;
                    let ok = self.adapter.verify_utxo_signed_transaction(
                        &token.chain,
                        symbol,
                        &[retired.address],
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
                let retired = Self::retired_address(&asset, token)?;
                let available = asset.coins_of(symbol).saturating_sub(asset.hold_of(symbol));
                let expected_amount = if spendable == DepositStatus::Confirmed {
                    available
                } else {
                    // The full balance was held when the order moved to
                    // WaitSign.
                    asset.hold_of(symbol)
                };
                let expected = ExpectedAccountTx {
                    token,
                    to: &m.to_address,
                    amount: expected_amount,
                    from: if signed { Some(&retired.address) } else { None },
                    nonce: Some(retired.nonce),
                };
                custos_verify::verify_account_tx(&expected, &tx, 1)?;
                if signed {
                    let ok = self.adapter.verify_account_signed_transaction(
                        &token.chain,
                        symbol,
                        &retired.address,
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

    /// Bind the migration order to its transaction and hold the moving
    /// balance.
    pub fn opcu_asset_transfer_wait_sign(
        &self,
        opcu: &CuAddress,
        order_id: &OrderId,
        raw_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let m = self.migration_order(order_id, OrderStatus::Begin)?;
        let token = self.token(&m.base.symbol)?;
        let symbol = m.base.symbol.clone();

        let cost_fee =
            self.verify_migration_tx(opcu, &token, &m, raw_data, false, DepositStatus::Confirmed)?;

        let ledger = self.ledger();
        let moving = match token.tx_model {
            TxModel::Utxo => m
                .total_amount()
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?,
            TxModel::Account => {
                let asset = ledger.get_asset(opcu)?;
                asset.coins_of(&symbol).saturating_sub(asset.hold_of(&symbol))
            }
        };
        ledger.hold_asset_coins(opcu, &symbol, moving)?;
        for item in &m.items {
            ledger.set_deposit_status(&symbol, opcu, &item.tx_hash, item.index, DepositStatus::InProcess)?;
        }

        let mut updated = m.clone();
        updated.raw_data = raw_data.to_vec();
        updated.cost_fee = cost_fee;
        let mut order = Order::OpcuAssetTransfer(updated);
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

    /// Attach the signed migration payload after re-verification.
    pub fn opcu_asset_transfer_sign_finish(
        &self,
        opcu: &CuAddress,
        order_id: &OrderId,
        signed_data: &[u8],
    ) -> Result<Receipt, SettlementError> {
        self.require_cu_of_kind(opcu, CuKind::Op)?;
        let m = self.migration_order(order_id, OrderStatus::WaitSign)?;
        let token = self.token(&m.base.symbol)?;

        self.verify_migration_tx(opcu, &token, &m, signed_data, true, DepositStatus::InProcess)?;

        let mut updated = m.clone();
        updated.signed_tx = signed_data.to_vec();
        let mut order = Order::OpcuAssetTransfer(updated);
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

    /// Quorum-gated settlement of a broadcast migration.
    ///
    /// The balance stays with the OPCU minus the cost fee; old items are
    /// consumed and re-minted on the current-epoch address; migration
    /// status advances to `AssetBegin`.
    pub fn opcu_asset_transfer_finish(
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
        let m = self.migration_order(order_id, OrderStatus::SignFinish)?;
        let token = self.token(&m.base.symbol)?;
        let symbol = m.base.symbol.clone();
        let opcu = m.base.cu_address.clone();

        let digest =
            Self::confirm_digest("opcu_asset_transfer_finish", &ids, settle_tx_hash.as_bytes());
        let conflicting = match self
            .book()
            .submit(order_id, validator, digest, &self.validators)?
        {
            ConfirmOutcome::Pending { votes } => {
                debug!(%order_id, votes, "migration confirmation pending");
                return Ok(Receipt::empty());
            }
            ConfirmOutcome::Quorum { votes, conflicting } => {
                info!(%order_id, votes, %opcu, "migration reached quorum");
                conflicting
            }
        };

        let ledger = self.ledger();
        let moving = match token.tx_model {
            TxModel::Utxo => m
                .total_amount()
                .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))?,
            TxModel::Account => ledger.get_asset(&opcu)?.hold_of(&symbol),
        };
        let total_before = moving;
        ledger.release_asset_hold(&opcu, &symbol, moving)?;
        if token.tx_model == TxModel::Utxo {
            // The fee leaves the balance; the rest lands back on the new
            // address as change.
            ledger.sub_asset_coins(&opcu, &symbol, m.cost_fee)?;
            for item in &m.items {
                ledger.consume_deposit_item(&symbol, &opcu, &item.tx_hash, item.index)?;
            }
            self.mint_collect_change(&opcu, &symbol, &token, &m.signed_tx, settle_tx_hash)?;
        } else {
            // The migration broadcast from the retired address; account for
            // its spent nonce.
            let epoch = ledger.get_asset(&opcu)?.asset_pubkey_epoch;
            ledger.bump_nonce_at_epoch(&opcu, &token.chain, epoch)?;
        }
        ledger.record_gas(&opcu, &token.chain, m.cost_fee, Amount::ZERO)?;
        ledger.set_migration_status(&opcu, MigrationStatus::AssetBegin)?;

        let mut updated = m.clone();
        updated.settle_tx_hash = settle_tx_hash.to_string();
        let mut order = Order::OpcuAssetTransfer(updated);
        self.orders().advance(&mut order, OrderStatus::Finish)?;

        let mut receipt = Receipt::empty();
        receipt.push(Flow::Order(OrderFlow {
            cu: opcu.clone(),
            order_id: *order_id,
            order_type: order.order_type(),
            status: order.status(),
        }));
        receipt.push(Flow::OpcuAssetTransfer(OpcuAssetTransferFlow {
            opcu: opcu.clone(),
            symbol: symbol.clone(),
            to_address: m.to_address.clone(),
            total_amount: total_before,
            cost_fee: m.cost_fee,
        }));

        self.book().conclude(order_id)?;
        self.forward_misbehaviour(order_id, &conflicting);
        Ok(receipt)
    }

    /// Close out a rotation: once no eligible items remain on retired
    /// addresses for any of the OPCU's symbols, migration flips from
    /// `AssetBegin` to `Finish`. Returns whether the flip happened.
    pub fn after_new_epoch(
        &self,
        opcu: &CuAddress,
        symbols: &[Symbol],
    ) -> Result<bool, SettlementError> {
        let ledger = self.ledger();
        let asset = ledger.get_asset(opcu)?;
        if asset.migration_status != MigrationStatus::AssetBegin {
            return Ok(false);
        }
        for symbol in symbols {
            let token = self.token(symbol)?;
            if token.tx_model != TxModel::Utxo {
                continue;
            }
            let retired = match asset.address_at_epoch(&token.chain, asset.asset_pubkey_epoch) {
                Some(entry) => entry.address.clone(),
                None => continue,
            };
            if !self.eligible_items(opcu, symbol, &retired)?.is_empty() {
                return Ok(false);
            }
        }
        ledger.set_migration_status(opcu, MigrationStatus::Finish)?;
        info!(%opcu, "epoch migration complete");
        Ok(true)
    }
}
