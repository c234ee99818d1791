//! Chain-adapter collaborator traits.
//!
//! The per-chain RPC adapter decodes raw/signed transaction bytes into the
//! normalized records in [`tx`] and validates foreign addresses. This crate
//! defines only the seam: real adapters live outside the engine, and the
//! nullables crate provides a programmable test double.

pub mod adapter;
pub mod error;
pub mod registry;
pub mod tx;

pub use adapter::ChainAdapter;
pub use error::ChainError;
pub use registry::TokenRegistry;
pub use tx::{AccountTransaction, UtxoIn, UtxoOut, UtxoTransaction};
