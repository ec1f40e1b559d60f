//! The `ProviderAdapter` capability interface and helpers shared by its implementations.
//!
//! Every courier speaks its own REST dialect, but they fail in the same few ways: transport errors,
//! non-2xx responses, and HTTP 200 bodies that carry a business-rule rejection. The helpers here
//! classify those uniformly so each adapter only describes its payload shapes.

use super::transport::HttpResponse;
use super::types::{
	CancelResult, Capability, CourierError, NormalizedEvent, PickupRequest, PickupResult,
	ProviderStatus, RateQuery, ShippingRate, SyncResult,
};
use crate::order::{DeliveryType, Order};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::warn;

/// One courier integration.
///
/// Implementations are bound to a single [`ProviderConfig`](super::ProviderConfig) and are cheap to
/// construct; the registry builds a fresh instance per lookup.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
	/// Registry code of this provider.
	fn code(&self) -> &str;

	fn display_name(&self) -> &str;

	/// Book a shipment for `order` with the given delivery type.
	async fn push_order(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<SyncResult, CourierError>;

	/// Fetch the latest status of a shipment.
	async fn pull_status(&self, tracking_id: &str) -> Result<ProviderStatus, CourierError>;

	async fn cancel_shipment(
		&self,
		_tracking_id: &str,
		_reason: &str,
	) -> Result<Capability<CancelResult>, CourierError> {
		Ok(Capability::unsupported(self.code(), "cancel_shipment"))
	}

	async fn request_pickup(
		&self,
		_request: &PickupRequest,
	) -> Result<Capability<PickupResult>, CourierError> {
		Ok(Capability::unsupported(self.code(), "request_pickup"))
	}

	async fn shipping_rates(
		&self,
		_query: &RateQuery,
	) -> Result<Capability<ShippingRate>, CourierError> {
		Ok(Capability::unsupported(self.code(), "shipping_rates"))
	}

	/// Translate a callback body into a [`NormalizedEvent`].
	fn normalize_webhook(&self, payload: &Value) -> Result<NormalizedEvent, CourierError>;

	/// Pull the authenticity signature out of a callback, from a header or a body field.
	fn webhook_signature(
		&self,
		headers: &BTreeMap<String, String>,
		payload: &Value,
	) -> Option<String>;

	/// Check a callback's signature against the raw body.
	fn verify_webhook_signature(&self, signature: Option<&str>, payload: &[u8]) -> bool;
}

/// Decide whether a create-shipment response is a success and extract the tracking id.
///
/// A 2xx response still counts as a rejection when the body carries an error object or string,
/// `success: false`, or no tracking id under any of `tracking_keys`.
pub fn classify_create_response(
	response: &HttpResponse,
	tracking_keys: &[&str],
) -> Result<String, CourierError> {
	ensure_accepted(response)?;

	json_string(&response.body, tracking_keys).ok_or_else(|| {
		CourierError::rejected(
			"Courier response did not include a tracking id",
			response.body.clone(),
		)
	})
}

/// Fail on transport-level and body-level errors, for calls that need no tracking id.
pub fn ensure_accepted(response: &HttpResponse) -> Result<(), CourierError> {
	if matches!(response.status, 408 | 429) || response.status >= 500 {
		return Err(CourierError::Unavailable(format!(
			"Courier returned HTTP {}",
			response.status
		)));
	}

	if let Some(message) = extract_error_message(&response.body) {
		return Err(CourierError::rejected(message, response.body.clone()));
	}

	if !response.is_success() {
		return Err(CourierError::rejected(
			format!("Courier returned HTTP {}", response.status),
			response.body.clone(),
		));
	}

	Ok(())
}

/// Human readable error carried in a courier body, if any.
///
/// Object errors become `Label: message` pairs joined by `"; "`, e.g.
/// `{"Error": {"phone": "Invalid Phone Number"}}` → `"Phone Number: Invalid Phone Number"`.
pub fn extract_error_message(body: &Value) -> Option<String> {
	for key in ["Error", "error", "errors", "Errors"] {
		match body.get(key) {
			None | Some(Value::Null) => continue,
			Some(Value::Bool(false)) => continue,
			Some(Value::Bool(true)) => {
				return Some(
					json_string(body, &["message", "Message", "detail", "msg"])
						.unwrap_or_else(|| "Courier reported an error".to_string()),
				);
			}
			Some(Value::String(message)) if message.trim().is_empty() => continue,
			Some(Value::String(message)) => return Some(message.trim().to_string()),
			Some(Value::Object(fields)) if fields.is_empty() => continue,
			Some(Value::Object(fields)) => {
				let pairs = fields
					.iter()
					.map(|(field, message)| format!("{}: {}", field_label(field), flatten_message(message)))
					.collect::<Vec<_>>();
				return Some(pairs.join("; "));
			}
			Some(Value::Array(items)) if items.is_empty() => continue,
			Some(other) => return Some(flatten_message(other)),
		}
	}

	if body.get("success").and_then(Value::as_bool) == Some(false) {
		let message = json_string(body, &["message", "Message", "detail", "msg"])
			.unwrap_or_else(|| "Courier rejected the request".to_string());
		return Some(message);
	}

	None
}

/// Plain-language label for a courier field name.
pub fn field_label(field: &str) -> String {
	let known = match field {
		"phone" | "receiver_number" => "Phone Number",
		"phone2" | "receiver_alt_number" => "Secondary Phone",
		"name" | "receiver_name" => "Customer Name",
		"address" | "receiver_address" => "Address",
		"branch" | "destination_branch" => "Destination Branch",
		"fbranch" => "Source Branch",
		"cod_charge" => "COD Amount",
		"vref_id" | "reference_id" => "Order Reference",
		_ => "",
	};
	if !known.is_empty() {
		return known.to_string();
	}

	field
		.split(['_', ' '])
		.filter(|word| !word.is_empty())
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join(" ")
}

fn flatten_message(value: &Value) -> String {
	match value {
		Value::String(message) => message.trim().to_string(),
		Value::Array(items) => items.iter().map(flatten_message).collect::<Vec<_>>().join(", "),
		Value::Object(fields) => fields
			.iter()
			.map(|(field, message)| format!("{}: {}", field_label(field), flatten_message(message)))
			.collect::<Vec<_>>()
			.join("; "),
		other => other.to_string(),
	}
}

/// First non-empty string (or number rendered as a string) found under any of `keys`.
pub fn json_string(value: &Value, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| match value.get(*key) {
		Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
		Some(Value::Number(n)) => Some(n.to_string()),
		_ => None,
	})
}

/// Case-insensitive header lookup over a lower-cased header snapshot.
pub fn header_value(headers: &BTreeMap<String, String>, name: &str) -> Option<String> {
	headers
		.get(&name.to_ascii_lowercase())
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

/// Verify a webhook signature against a shared secret.
///
/// Accepts either the secret itself or a hex HMAC-SHA256 of the body keyed with it (optionally
/// prefixed `sha256=`). With no secret configured every request is accepted.
pub fn verify_shared_secret(
	provider: &str,
	secret: Option<&str>,
	signature: Option<&str>,
	payload: &[u8],
) -> bool {
	let Some(secret) = secret.filter(|s| !s.is_empty()) else {
		warn!("No webhook secret configured for {}, accepting unsigned callback", provider);
		return true;
	};
	let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
		return false;
	};

	if constant_time_eq(signature.as_bytes(), secret.as_bytes()) {
		return true;
	}

	let hex_signature = signature.strip_prefix("sha256=").unwrap_or(signature);
	let Ok(signature_bytes) = hex::decode(hex_signature) else {
		return false;
	};
	let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
		return false;
	};
	mac.update(payload);
	mac.verify_slice(&signature_bytes).is_ok()
}

/// Hex HMAC-SHA256 of `payload`, as couriers are expected to send it.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
	let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
	mac.update(payload);
	Some(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
