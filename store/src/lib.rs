//! Abstract storage traits for the custos settlement engine.
//!
//! The replicated key-value ledger store is an external collaborator; every
//! backend (the node's replicated store, in-memory nullables for testing)
//! implements these traits. The rest of the workspace depends only on the
//! traits. Complex values owned by higher crates (orders, vote tallies)
//! cross this boundary as serialized bytes.

pub mod asset;
pub mod cu;
pub mod deposit;
pub mod error;
pub mod order;
pub mod vote;

pub use asset::{AssetAddress, AssetStore, CuAsset};
pub use cu::{CuInfo, CuStore};
pub use deposit::{DepositItem, DepositStore};
pub use error::StoreError;
pub use order::OrderStore;
pub use vote::VoteStore;
