//! Shared state enums for custodian units and deposits.

use serde::{Deserialize, Serialize};

/// The two custodian unit kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CuKind {
    /// An end-customer account.
    User,
    /// An operational custodian pooling foreign-chain funds for one symbol.
    Op,
}

/// Lifecycle of a deposit item, from first on-chain sighting to consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositStatus {
    /// Seen but not yet quorum-confirmed.
    UnCollected,
    /// Confirmed on a user CU, queued for consolidation into the OPCU.
    WaitCollect,
    /// Being consumed by an in-flight settlement transaction.
    InProcess,
    /// Settled — spendable by the OPCU as a UTXO input.
    Confirmed,
}

/// Epoch key-rotation progress for an OPCU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// No migration in flight.
    #[default]
    Finish,
    /// A new epoch started; key material rotated, assets not yet moved.
    Begin,
    /// Asset transfer orders are settling for this OPCU.
    AssetBegin,
}
