//! Courier Sync Module
//!
//! This module provides the logic for getting orders onto a courier's books and keeping their
//! logistics fields current. It is composed of several submodules:
//!
//! - `orchestrator`: The façade used by the rest of the application. Validates, pushes, persists and verifies.
//! - `delivery_type`: Reconciles the persisted delivery type with a caller-supplied override.
//! - `provider_resolver`: Maps the free-text courier partner on an order to a registry code.
//! - `failure_recorder`: Writes failed attempts into the order's audit field without ever failing itself.
//! - `events`: Notification events and the dispatcher that fans them out.
//! - `progress_tracker`: Counts and summarizes bulk runs.

/// Home delivery vs. branch pickup resolution
pub mod delivery_type;
/// Logistics notifications
pub mod events;
/// Audit of failed sync attempts
pub mod failure_recorder;
/// The logistics façade
pub mod orchestrator;
/// Bulk run statistics
pub mod progress_tracker;
/// Courier partner name matching
pub mod provider_resolver;

pub use events::{LogisticsEvent, Notifier, NotificationDispatcher, NotifyError, TracingNotifier};
pub use failure_recorder::FailureRecorder;
pub use orchestrator::{
    BulkFailure, BulkOutcome, DEFAULT_BULK_DELAY, StatusSnapshot, SyncConfig, SyncOptions,
    SyncOrchestrator, SyncOutcome, forward_status, parse_order_id,
};
pub use progress_tracker::{BulkSyncStats, BulkSyncTracker};
pub use provider_resolver::resolve_provider_code;
