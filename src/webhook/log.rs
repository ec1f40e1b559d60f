//! Append-only audit log of inbound courier callbacks.

use crate::order::StoreError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

const REDACTED: &str = "[redacted]";

/// Processing status of a logged callback. Everything except `Received` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookLogStatus {
	Received,
	Processed,
	Duplicate,
	/// Stale event that would move the order backwards
	Ignored,
	ProviderUnknown,
	Unauthorized,
	OrderNotFound,
	InvalidPayload,
	Failed,
}

impl WebhookLogStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			WebhookLogStatus::Received => "received",
			WebhookLogStatus::Processed => "processed",
			WebhookLogStatus::Duplicate => "duplicate",
			WebhookLogStatus::Ignored => "ignored",
			WebhookLogStatus::ProviderUnknown => "provider_unknown",
			WebhookLogStatus::Unauthorized => "unauthorized",
			WebhookLogStatus::OrderNotFound => "order_not_found",
			WebhookLogStatus::InvalidPayload => "invalid_payload",
			WebhookLogStatus::Failed => "failed",
		}
	}

	pub fn is_terminal(&self) -> bool {
		*self != WebhookLogStatus::Received
	}
}

impl fmt::Display for WebhookLogStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One inbound callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookLogEntry {
	pub id: Uuid,
	/// Provider code from the route, `None` for unrouted callbacks.
	pub provider: Option<String>,
	/// Tracking id as sent by the courier, before sanitizing.
	pub tracking_id: Option<String>,
	/// Lower-cased request headers with credentials redacted.
	pub headers: BTreeMap<String, String>,
	pub body: String,
	pub status: WebhookLogStatus,
	pub order_id: Option<Uuid>,
	pub error: Option<String>,
	pub received_at: DateTime<Utc>,
	pub finalized_at: Option<DateTime<Utc>>,
}

impl WebhookLogEntry {
	pub fn received(provider: Option<&str>, headers: &BTreeMap<String, String>, body: &[u8]) -> Self {
		Self {
			id: Uuid::new_v4(),
			provider: provider.map(str::to_string),
			tracking_id: None,
			headers: redact_headers(headers),
			body: String::from_utf8_lossy(body).into_owned(),
			status: WebhookLogStatus::Received,
			order_id: None,
			error: None,
			received_at: Utc::now(),
			finalized_at: None,
		}
	}
}

/// Terminal fields written when a callback finishes processing.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResolution {
	pub status: WebhookLogStatus,
	pub provider: Option<String>,
	pub order_id: Option<Uuid>,
	pub tracking_id: Option<String>,
	pub error: Option<String>,
}

impl WebhookResolution {
	pub fn new(status: WebhookLogStatus) -> Self {
		Self {
			status,
			provider: None,
			order_id: None,
			tracking_id: None,
			error: None,
		}
	}
}

/// Storage for the webhook audit log.
///
/// Entries are appended on receipt and finalized exactly once. Nothing is ever deleted.
#[async_trait]
pub trait WebhookLogRepository: Send + Sync {
	async fn append(&self, entry: WebhookLogEntry) -> Result<Uuid, StoreError>;

	/// Record the terminal status. Fails with `Immutable` if the entry is already terminal.
	async fn finalize(&self, id: Uuid, resolution: WebhookResolution) -> Result<(), StoreError>;

	/// All entries, oldest first.
	async fn entries(&self) -> Result<Vec<WebhookLogEntry>, StoreError>;
}

/// In-process webhook log.
#[derive(Default)]
pub struct MemoryWebhookLog {
	entries: Mutex<Vec<WebhookLogEntry>>,
}

impl MemoryWebhookLog {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl WebhookLogRepository for MemoryWebhookLog {
	async fn append(&self, entry: WebhookLogEntry) -> Result<Uuid, StoreError> {
		let id = entry.id;
		self.entries.lock().push(entry);
		Ok(id)
	}

	async fn finalize(&self, id: Uuid, resolution: WebhookResolution) -> Result<(), StoreError> {
		let mut entries = self.entries.lock();
		let entry = entries
			.iter_mut()
			.find(|e| e.id == id)
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		if entry.status.is_terminal() {
			return Err(StoreError::Immutable(id.to_string()));
		}

		entry.status = resolution.status;
		if resolution.provider.is_some() {
			entry.provider = resolution.provider;
		}
		entry.order_id = resolution.order_id;
		entry.tracking_id = resolution.tracking_id;
		entry.error = resolution.error;
		entry.finalized_at = Some(Utc::now());
		Ok(())
	}

	async fn entries(&self) -> Result<Vec<WebhookLogEntry>, StoreError> {
		Ok(self.entries.lock().clone())
	}
}

/// Copy of `headers` with keys lower-cased and credential-bearing values replaced.
pub fn redact_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
	headers
		.iter()
		.map(|(name, value)| {
			let name = name.to_ascii_lowercase();
			let sensitive = name == "authorization"
				|| name == "cookie"
				|| name.contains("signature")
				|| name.contains("token")
				|| name.contains("secret");
			let value = if sensitive { REDACTED.to_string() } else { value.clone() };
			(name, value)
		})
		.collect()
}
