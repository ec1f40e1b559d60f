//! Logistics integration layer: pushes orders to third-party couriers, reconciles their identifiers
//! back into the order record, and ingests delivery-status callbacks.
//!
//! The entry points are [`SyncOrchestrator`] for outbound work and [`WebhookIntake`] for callbacks.
//! Both share one [`AdapterRegistry`], built at startup from [`Settings`].

pub mod config;
pub mod courier;
pub mod order;
pub mod utils;
pub mod webhook;

pub use config::{ConfigError, Settings};
pub use courier::{AdapterRegistry, CourierError, ProviderAdapter};
pub use order::sync::{SyncOptions, SyncOrchestrator};
pub use order::{LogisticsError, OrderStore};
pub use webhook::{WebhookIntake, webhook_router};
