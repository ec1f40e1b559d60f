//!
//! Utility module for courier sync.
//!
//! Re-exports field sanitizers and the keyed lock used to serialize work per order and per
//! tracking id.
/// Per-key async locks
pub mod locks;
/// Sanitizers for customer fields and untrusted identifiers
pub mod sanitize;

pub use locks::KeyedLocks;
pub use sanitize::{cod_charge, sanitize_address, sanitize_name, sanitize_phone, sanitize_tracking_id};
