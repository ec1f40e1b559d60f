//! Courier callback processing.
//!
//! Every callback is logged on receipt and finalized with its outcome. Callbacks are answered with
//! HTTP 200 whatever happens to them, except when their signature fails; the real outcome lives in
//! the log. Callbacks are applied under the same per-order lock the orchestrator holds, so every
//! status change to one order happens one at a time.

use super::log::{WebhookLogEntry, WebhookLogRepository, WebhookLogStatus, WebhookResolution};
use crate::courier::{AdapterRegistry, CourierError, NormalizedEvent, ProviderAdapter, json_string};
use crate::order::sync::{LogisticsEvent, NotificationDispatcher, forward_status};
use crate::order::{Order, OrderComment, OrderStatus, OrderStore, OrderUpdate, StoreError};
use crate::utils::{KeyedLocks, sanitize_tracking_id};

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Body fields that may carry a tracking id on callbacks that arrive without a provider code.
const TRACKING_ID_HINTS: [&str; 3] = ["tracking_id", "order_id", "orderid"];

/// Raw inbound callback.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
	/// Header names lower-cased.
	pub headers: BTreeMap<String, String>,
	pub body: Vec<u8>,
}

impl WebhookRequest {
	pub fn new(body: impl Into<Vec<u8>>) -> Self {
		Self {
			headers: BTreeMap::new(),
			body: body.into(),
		}
	}

	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());
		self
	}
}

/// What happened to a callback.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
	/// The event was recorded on the order. `status` is the new order status if it moved.
	Processed {
		order_id: Uuid,
		status: Option<OrderStatus>,
	},
	/// The event was seen before.
	Duplicate { order_id: Uuid },
	/// The event would move the order backwards. It is kept as a comment only.
	Ignored { order_id: Uuid },
	ProviderUnknown,
	Unauthorized,
	OrderNotFound { tracking_id: String },
	InvalidPayload(String),
	Failed(String),
}

impl WebhookOutcome {
	/// Status code to answer the courier with.
	pub fn http_status(&self) -> u16 {
		match self {
			WebhookOutcome::Unauthorized => 401,
			_ => 200,
		}
	}

	pub fn log_status(&self) -> WebhookLogStatus {
		match self {
			WebhookOutcome::Processed { .. } => WebhookLogStatus::Processed,
			WebhookOutcome::Duplicate { .. } => WebhookLogStatus::Duplicate,
			WebhookOutcome::Ignored { .. } => WebhookLogStatus::Ignored,
			WebhookOutcome::ProviderUnknown => WebhookLogStatus::ProviderUnknown,
			WebhookOutcome::Unauthorized => WebhookLogStatus::Unauthorized,
			WebhookOutcome::OrderNotFound { .. } => WebhookLogStatus::OrderNotFound,
			WebhookOutcome::InvalidPayload(_) => WebhookLogStatus::InvalidPayload,
			WebhookOutcome::Failed(_) => WebhookLogStatus::Failed,
		}
	}

	pub fn order_id(&self) -> Option<Uuid> {
		match self {
			WebhookOutcome::Processed { order_id, .. }
			| WebhookOutcome::Duplicate { order_id }
			| WebhookOutcome::Ignored { order_id } => Some(*order_id),
			_ => None,
		}
	}

	fn error(&self) -> Option<String> {
		match self {
			WebhookOutcome::InvalidPayload(message) | WebhookOutcome::Failed(message) => {
				Some(message.clone())
			}
			WebhookOutcome::Unauthorized => Some("Signature verification failed".to_string()),
			WebhookOutcome::OrderNotFound { tracking_id } => {
				Some(format!("No order references tracking id {}", tracking_id))
			}
			_ => None,
		}
	}
}

/// Key under which an event is deduplicated: the courier's event id, or a fingerprint of the body
/// when the courier sends none.
pub fn dedup_key(event_id: Option<&str>, raw_body: &[u8]) -> String {
	match event_id {
		Some(id) => id.to_string(),
		None => format!("sha256:{}", hex::encode(Sha256::digest(raw_body))),
	}
}

/// Receives courier callbacks and applies them to orders.
pub struct WebhookIntake {
	registry: Arc<AdapterRegistry>,
	store: Arc<dyn OrderStore>,
	log: Arc<dyn WebhookLogRepository>,
	notifier: Arc<NotificationDispatcher>,
	order_locks: Arc<KeyedLocks<Uuid>>,
}

impl WebhookIntake {
	pub fn new(
		registry: Arc<AdapterRegistry>,
		store: Arc<dyn OrderStore>,
		log: Arc<dyn WebhookLogRepository>,
		notifier: Arc<NotificationDispatcher>,
		order_locks: Arc<KeyedLocks<Uuid>>,
	) -> Self {
		Self {
			registry,
			store,
			log,
			notifier,
			order_locks,
		}
	}

	/// Process a callback whose signature was already extracted by the caller.
	pub async fn handle(
		&self,
		provider_code: &str,
		raw_payload: &[u8],
		signature: Option<&str>,
	) -> WebhookOutcome {
		let request = WebhookRequest::new(raw_payload);
		self.run(Some(provider_code), &request, signature.map(str::to_string))
			.await
	}

	/// Process a callback routed to `provider_code`. The adapter finds the signature in the headers
	/// or body.
	pub async fn handle_request(&self, provider_code: &str, request: &WebhookRequest) -> WebhookOutcome {
		self.run(Some(provider_code), request, None).await
	}

	/// Process a callback that arrived without a provider code, routing it through the order that
	/// holds the tracking id found in the body.
	pub async fn handle_unrouted(&self, request: &WebhookRequest) -> WebhookOutcome {
		let hint = serde_json::from_slice::<Value>(&request.body)
			.ok()
			.and_then(|body| json_string(&body, &TRACKING_ID_HINTS));

		let provider = match hint {
			Some(tracking_id) => self
				.registry
				.get_by_tracking_id(&tracking_id)
				.await
				.map(|adapter| adapter.code().to_string()),
			None => None,
		};

		self.run(provider.as_deref(), request, None).await
	}

	async fn run(
		&self,
		provider_code: Option<&str>,
		request: &WebhookRequest,
		signature: Option<String>,
	) -> WebhookOutcome {
		let log_id = match self
			.log
			.append(WebhookLogEntry::received(provider_code, &request.headers, &request.body))
			.await
		{
			Ok(id) => Some(id),
			Err(e) => {
				error!("Failed to log webhook from {:?}: {}", provider_code, e);
				None
			}
		};

		let mut tracking_id = None;
		let outcome = self
			.process(provider_code, request, signature, &mut tracking_id)
			.await;

		match &outcome {
			WebhookOutcome::Processed { .. } => {
				info!("Webhook from {:?} processed: {:?}", provider_code, outcome)
			}
			WebhookOutcome::Unauthorized => {
				warn!("Rejected webhook from {:?}: signature mismatch", provider_code)
			}
			other => debug!("Webhook from {:?} finished as {}", provider_code, other.log_status()),
		}

		if let Some(log_id) = log_id {
			let resolution = WebhookResolution {
				status: outcome.log_status(),
				provider: provider_code.map(str::to_string),
				order_id: outcome.order_id(),
				tracking_id,
				error: outcome.error(),
			};
			if let Err(e) = self.log.finalize(log_id, resolution).await {
				error!("Failed to finalize webhook log {}: {}", log_id, e);
			}
		}

		outcome
	}

	async fn process(
		&self,
		provider_code: Option<&str>,
		request: &WebhookRequest,
		signature: Option<String>,
		tracking_id_out: &mut Option<String>,
	) -> WebhookOutcome {
		let Some(provider_code) = provider_code else {
			return WebhookOutcome::ProviderUnknown;
		};
		let adapter = match self.registry.get(provider_code).await {
			Ok(adapter) => adapter,
			Err(CourierError::UnknownProvider(_)) | Err(CourierError::Config(_)) => {
				return WebhookOutcome::ProviderUnknown;
			}
			Err(e) => return WebhookOutcome::Failed(e.to_string()),
		};

		let payload: Value = match serde_json::from_slice(&request.body) {
			Ok(payload) => payload,
			Err(e) => return WebhookOutcome::InvalidPayload(format!("Body is not JSON: {}", e)),
		};

		let signature = signature.or_else(|| adapter.webhook_signature(&request.headers, &payload));
		if !adapter.verify_webhook_signature(signature.as_deref(), &request.body) {
			return WebhookOutcome::Unauthorized;
		}

		let event = match adapter.normalize_webhook(&payload) {
			Ok(event) => event,
			Err(e) => return WebhookOutcome::InvalidPayload(e.to_string()),
		};
		*tracking_id_out = Some(event.tracking_id.clone());

		let Some(tracking_id) = sanitize_tracking_id(&event.tracking_id) else {
			return WebhookOutcome::OrderNotFound {
				tracking_id: event.tracking_id.clone(),
			};
		};

		match self.apply(adapter.as_ref(), &tracking_id, &event, &request.body).await {
			Ok(outcome) => outcome,
			Err(e) => WebhookOutcome::Failed(e.to_string()),
		}
	}

	async fn apply(
		&self,
		adapter: &dyn ProviderAdapter,
		tracking_id: &str,
		event: &NormalizedEvent,
		raw_body: &[u8],
	) -> Result<WebhookOutcome, StoreError> {
		let Some(found) = self.store.find_by_tracking_id(tracking_id).await? else {
			return Ok(WebhookOutcome::OrderNotFound {
				tracking_id: tracking_id.to_string(),
			});
		};

		// The lookup ran unlocked; decide on the order as it stands once the lock is held.
		let _guard = self.order_locks.lock(&found.id).await;
		let Some(order) = self.store.get(found.id).await? else {
			return Ok(WebhookOutcome::OrderNotFound {
				tracking_id: tracking_id.to_string(),
			});
		};

		let key = dedup_key(event.event_id.as_deref(), raw_body);
		if self.store.find_comment_by_event(order.id, &key).await?.is_some() {
			debug!("Discarding redelivered event {} for order {}", key, order.id);
			return Ok(WebhookOutcome::Duplicate { order_id: order.id });
		}

		let target = forward_status(order.status, event.canonical_status);
		let stale = target.is_none() && OrderStatus::from_canonical(event.canonical_status).is_some();

		if let Some(target) = target {
			self.store
				.update(
					order.id,
					&OrderUpdate {
						logistics_status: Some(event.raw_status.clone()),
						status: Some(target),
						..Default::default()
					},
				)
				.await?;
		}

		self.store
			.append_comment(OrderComment::courier(
				order.id,
				comment_body(adapter.display_name(), event),
				Some(key),
			))
			.await?;

		if let Some(target) = target {
			self.notify_status_change(&order, tracking_id, target, event).await;
			return Ok(WebhookOutcome::Processed {
				order_id: order.id,
				status: Some(target),
			});
		}

		if stale {
			info!(
				"Ignoring stale courier status {:?} for order {} at {}",
				event.raw_status, order.id, order.status
			);
			return Ok(WebhookOutcome::Ignored { order_id: order.id });
		}

		Ok(WebhookOutcome::Processed {
			order_id: order.id,
			status: None,
		})
	}

	async fn notify_status_change(
		&self,
		order: &Order,
		tracking_id: &str,
		target: OrderStatus,
		event: &NormalizedEvent,
	) {
		self.notifier
			.dispatch(&LogisticsEvent::StatusChanged {
				order_id: order.id,
				tracking_id: tracking_id.to_string(),
				from: order.status,
				to: target,
				raw_status: event.raw_status.clone(),
			})
			.await;
	}
}

/// `"<Courier>: <raw status> - <remarks> (<location>)"`, omitting what the courier did not send.
fn comment_body(courier: &str, event: &NormalizedEvent) -> String {
	let mut body = format!("{}: {}", courier, event.raw_status);
	if let Some(remarks) = &event.remarks {
		body.push_str(" - ");
		body.push_str(remarks);
	}
	if let Some(location) = &event.location {
		body.push_str(&format!(" ({})", location));
	}
	body
}
