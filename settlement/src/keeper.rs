//! The settlement keeper — shared state and helpers behind every workflow
//! entry point.

use crate::error::SettlementError;
use crate::flows::{BalanceFlow, Flow};
use custos_chain::adapter::ChainAdapter;
use custos_chain::registry::TokenRegistry;
use custos_ledger::AssetLedger;
use custos_orders::{Order, OrderKeeper};
use custos_quorum::{payload_digest, ConfirmationBook, EvidenceKeeper, PayloadDigest, ValidatorSet};
use custos_store::asset::AssetStore;
use custos_store::cu::{CuInfo, CuStore};
use custos_store::deposit::DepositStore;
use custos_store::order::OrderStore;
use custos_store::vote::VoteStore;
use custos_types::{Amount, CuAddress, CuKind, OrderId, Symbol, TokenInfo};

/// Orchestrates the settlement workflows over borrowed collaborators.
///
/// One keeper is built per block: the validator-set snapshot and height are
/// fixed at construction so replay at any height sees the state that was
/// current then. All mutation flows through the ledger, order keeper, and
/// confirmation book; the keeper itself holds no caches.
pub struct SettlementKeeper<'a, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    pub(crate) store: &'a S,
    pub(crate) adapter: &'a A,
    pub(crate) tokens: &'a R,
    pub(crate) evidence: &'a E,
    pub(crate) validators: ValidatorSet,
    pub(crate) height: u64,
}

impl<'a, S, A, R, E> SettlementKeeper<'a, S, A, R, E>
where
    S: CuStore + AssetStore + DepositStore + OrderStore + VoteStore,
    A: ChainAdapter,
    R: TokenRegistry,
    E: EvidenceKeeper,
{
    pub fn new(
        store: &'a S,
        adapter: &'a A,
        tokens: &'a R,
        evidence: &'a E,
        validators: ValidatorSet,
        height: u64,
    ) -> Self {
        Self {
            store,
            adapter,
            tokens,
            evidence,
            validators,
            height,
        }
    }

    pub(crate) fn ledger(&self) -> AssetLedger<'a, S, S, S> {
        AssetLedger::new(self.store, self.store, self.store)
    }

    pub(crate) fn orders(&self) -> OrderKeeper<'a, S> {
        OrderKeeper::new(self.store)
    }

    pub(crate) fn book(&self) -> ConfirmationBook<'a, S> {
        ConfirmationBook::new(self.store)
    }

    pub(crate) fn token(&self, symbol: &Symbol) -> Result<TokenInfo, SettlementError> {
        Ok(self.tokens.get_token(symbol)?)
    }

    /// Fetch a CU that must already exist.
    pub(crate) fn require_cu(&self, address: &CuAddress) -> Result<CuInfo, SettlementError> {
        self.ledger()
            .get_cu(address)
            .map_err(|_| SettlementError::InvalidAccount(address.to_string()))
    }

    pub(crate) fn require_cu_of_kind(
        &self,
        address: &CuAddress,
        kind: CuKind,
    ) -> Result<CuInfo, SettlementError> {
        self.ledger()
            .get_cu_of_kind(address, kind)
            .map_err(|_| SettlementError::InvalidAccount(address.to_string()))
    }

    /// Load a batch of orders, mapping missing ids to `NotFoundOrder`.
    pub(crate) fn load_orders(&self, ids: &[OrderId]) -> Result<Vec<Order>, SettlementError> {
        ids.iter()
            .map(|id| {
                self.orders()
                    .get(id)
                    .map_err(|_| SettlementError::NotFoundOrder(id.to_string()))
            })
            .collect()
    }

    /// Digest of a confirmation payload: a context tag, the sorted order
    /// ids, and the call's evidence bytes. Sorting makes the digest
    /// independent of argument order.
    pub(crate) fn confirm_digest(
        tag: &str,
        order_ids: &[OrderId],
        evidence: &[u8],
    ) -> PayloadDigest {
        let mut ids: Vec<String> = order_ids.iter().map(|id| id.to_string()).collect();
        ids.sort();
        let mut payload = tag.as_bytes().to_vec();
        for id in ids {
            payload.extend_from_slice(id.as_bytes());
        }
        payload.extend_from_slice(evidence);
        payload_digest(&payload)
    }

    /// The tally an order batch accumulates votes under: its smallest id.
    pub(crate) fn tally_id(order_ids: &[OrderId]) -> Result<OrderId, SettlementError> {
        order_ids
            .iter()
            .min()
            .copied()
            .ok_or_else(|| SettlementError::InvalidOrder("empty order batch".into()))
    }

    /// Forward validators that attested a conflicting payload.
    pub(crate) fn forward_misbehaviour(
        &self,
        order_id: &OrderId,
        conflicting: &[custos_types::ValidatorId],
    ) {
        for validator in conflicting {
            tracing::warn!(%validator, %order_id, "conflicting confirmation payload");
            self.evidence
                .record_misbehaviour_voter(validator, order_id, self.height);
        }
    }

    /// Sum amounts from decoded or stored data, surfacing overflow as a
    /// settlement error instead of a panic.
    pub(crate) fn checked_total<I: IntoIterator<Item = Amount>>(
        amounts: I,
    ) -> Result<Amount, SettlementError> {
        Amount::checked_sum(amounts)
            .ok_or_else(|| SettlementError::AmountError("amount overflow".into()))
    }

    /// Build a balance flow from before/after snapshots.
    pub(crate) fn balance_flow(
        cu: &CuAddress,
        symbol: &Symbol,
        previous_balance: Amount,
        previous_hold: Amount,
        balance: Amount,
        hold: Amount,
    ) -> Flow {
        Flow::Balance(BalanceFlow {
            cu: cu.clone(),
            symbol: symbol.clone(),
            previous_balance,
            balance_change: balance.raw() as i128 - previous_balance.raw() as i128,
            previous_hold,
            hold_change: hold.raw() as i128 - previous_hold.raw() as i128,
        })
    }
}
