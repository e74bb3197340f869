//! Shared types and rules for the Stockroom inventory platform
//!
//! This crate holds the domain model and the pure rules that the backend,
//! the browser (via WASM) and the tests all agree on: stock status
//! derivation, sale status transitions, margin math, dense trend buckets,
//! the category tree and the role permission table.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
