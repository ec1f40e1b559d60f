//! Courier webhook module
//!
//! Intake of asynchronous delivery-status callbacks: authenticity checks, normalization through the
//! matching adapter, deduplication, forward-only status transitions, and an append-only audit log of
//! every request. The axum router exposes the intake over HTTP.

/// Callback processing
mod intake;
/// Audit log of inbound callbacks
mod log;
/// HTTP endpoints
mod route;

pub use intake::{WebhookIntake, WebhookOutcome, WebhookRequest, dedup_key};
pub use log::{
	MemoryWebhookLog, WebhookLogEntry, WebhookLogRepository, WebhookLogStatus, WebhookResolution,
	redact_headers,
};
pub use route::webhook_router;
