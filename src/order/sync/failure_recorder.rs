//! Best-effort audit of failed sync attempts.

use crate::courier::CourierError;
use crate::order::{LogisticsError, OrderStore, OrderUpdate};

use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Writes a failure record into the order's opaque logistics response field.
///
/// Recording never fails the caller: store errors are logged and swallowed so the original error is
/// the one that propagates.
pub struct FailureRecorder {
	store: Arc<dyn OrderStore>,
}

impl FailureRecorder {
	pub fn new(store: Arc<dyn OrderStore>) -> Self {
		Self { store }
	}

	pub async fn record(&self, order_id: Uuid, failure: &LogisticsError) {
		let update = OrderUpdate {
			logistics_response: Some(failure_record(failure)),
			..Default::default()
		};

		match self.store.update(order_id, &update).await {
			Ok(_) => debug!("Recorded sync failure {} on order {}", failure.code(), order_id),
			Err(e) => error!(
				"Failed to record sync failure {} on order {}: {}",
				failure.code(),
				order_id,
				e
			),
		}
	}
}

/// `{success: false, error, code, timestamp}`, plus the courier body when the courier rejected the
/// request.
pub fn failure_record(failure: &LogisticsError) -> Value {
	let mut record = json!({
		"success": false,
		"error": failure.to_string(),
		"code": failure.code(),
		"timestamp": Utc::now().to_rfc3339(),
	});
	if let LogisticsError::Courier(CourierError::Rejected { response, .. }) = failure {
		record["provider_response"] = response.clone();
	}
	record
}

/// Error message of a recorded failure, if `response` is one.
pub fn recorded_error(response: Option<&Value>) -> Option<String> {
	let response = response?;
	if response.get("success").and_then(Value::as_bool) != Some(false) {
		return None;
	}
	response
		.get("error")
		.and_then(Value::as_str)
		.map(str::to_string)
}
