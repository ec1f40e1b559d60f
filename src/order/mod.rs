//! Order domain module
//!
//! The order record as this crate sees it, the store collaborator that owns it, and the sync
//! services that push orders to couriers and keep their logistics fields current.

/// Order store trait and in-memory implementation
mod store;
pub mod sync;
/// Order records, updates, comments and error types
mod types;

pub use store::{MemoryOrderStore, OrderStore};
pub use types::*;
