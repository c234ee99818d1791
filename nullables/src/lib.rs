//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies of the settlement engine (the replicated
//! ledger store, the per-chain RPC adapter, token configuration) are
//! abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be programmed from test fixtures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod store;

pub use chain::{NullChainAdapter, NullTokenRegistry};
pub use store::NullStore;
