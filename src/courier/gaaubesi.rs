//! Gaau Besi Logistics adapter.
//!
//! Gaau Besi reports business failures as `{"success": false, "message": ...}` with HTTP 200 and
//! has no public cancel, pickup or rate endpoints, so those capabilities answer `Unsupported`.

use super::adapter::{
	ProviderAdapter, classify_create_response, ensure_accepted, header_value, json_string,
	verify_shared_secret,
};
use super::transport::{HttpRequest, HttpTransport};
use super::types::{CourierError, NormalizedEvent, ProviderConfig, ProviderStatus, SyncResult};
use crate::order::{DeliveryType, Order, ValidationError};
use crate::utils::{cod_charge, sanitize_address, sanitize_name, sanitize_phone};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const GAAUBESI_CODE: &str = "gaaubesi";

const SIGNATURE_HEADER: &str = "x-gaaubesi-signature";

pub struct GaauBesiAdapter {
	config: ProviderConfig,
	transport: Arc<dyn HttpTransport>,
}

impl GaauBesiAdapter {
	pub fn new(config: ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
		Self { config, transport }
	}

	fn authorized(&self, request: HttpRequest) -> HttpRequest {
		match &self.config.api_token {
			Some(token) => request.header("Authorization", format!("Token {}", token)),
			None => request,
		}
	}

	pub fn build_payload(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<Value, ValidationError> {
		let receiver_name = sanitize_name(order.customer_name.as_deref())?;
		let receiver_number = sanitize_phone(
			order
				.phone
				.as_deref()
				.ok_or(ValidationError::MissingCustomerPhone)?,
		)?;
		let receiver_alt_number = order
			.secondary_phone
			.as_deref()
			.and_then(|p| sanitize_phone(p).ok());
		let destination_branch = order
			.destination_branch
			.as_deref()
			.map(str::trim)
			.filter(|b| !b.is_empty())
			.ok_or(ValidationError::MissingDestinationBranch)?
			.to_uppercase();

		Ok(json!({
			"branch": self.config.source_branch.clone().unwrap_or_else(|| "HEAD OFFICE".to_string()),
			"destination_branch": destination_branch,
			"receiver_name": receiver_name,
			"receiver_address": sanitize_address(order.address.as_deref(), Some(destination_branch.as_str())),
			"receiver_number": receiver_number,
			"receiver_alt_number": receiver_alt_number,
			"cod_charge": cod_charge(order.payable_amount, order.is_cash_on_delivery()),
			"package_access": "Can't Open",
			"delivery_type": match delivery_type {
				DeliveryType::D2D => "Drop Off",
				DeliveryType::D2B => "Pickup",
			},
			"order_contact_name": receiver_name,
			"remarks": order.package_description(),
			"package_type": "Parcel",
			"reference_id": order.id.to_string(),
		}))
	}

	/// Drop the `signature` field so the remaining body can be re-serialized for HMAC checks.
	fn unsigned_body(payload: &[u8]) -> Option<Vec<u8>> {
		let mut value: Value = serde_json::from_slice(payload).ok()?;
		value.as_object_mut()?.remove("signature")?;
		serde_json::to_vec(&value).ok()
	}
}

#[async_trait]
impl ProviderAdapter for GaauBesiAdapter {
	fn code(&self) -> &str {
		GAAUBESI_CODE
	}

	fn display_name(&self) -> &str {
		&self.config.display_name
	}

	async fn push_order(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<SyncResult, CourierError> {
		let payload = self.build_payload(order, delivery_type)?;

		let request = self.authorized(HttpRequest::post(self.config.endpoint("order/create/"), payload));
		let response = self.transport.send(request).await?;
		let tracking_id = classify_create_response(&response, &["order_id", "id"])?;

		let waybill = json_string(&response.body, &["tracking_code", "waybill"])
			.unwrap_or_else(|| tracking_id.clone());
		let message = json_string(&response.body, &["message"])
			.unwrap_or_else(|| "Order Created".to_string());

		info!("Gaau Besi accepted order {} as {}", order.id, tracking_id);
		Ok(SyncResult {
			provider: GAAUBESI_CODE.to_string(),
			tracking_id,
			waybill,
			message,
			delivery_type,
			raw_response: response.body,
		})
	}

	async fn pull_status(&self, tracking_id: &str) -> Result<ProviderStatus, CourierError> {
		let request = self.authorized(
			HttpRequest::get(self.config.endpoint("order/status/")).query("order_id", tracking_id),
		);
		let response = self.transport.send(request).await?;
		ensure_accepted(&response)?;

		// Either a history list under `status` (latest last) or a single record under `data`.
		let entry = match (response.body.get("status"), response.body.get("data")) {
			(Some(Value::Array(history)), _) => history.last(),
			(_, Some(data)) => Some(data),
			_ => None,
		}
		.ok_or_else(|| {
			CourierError::InvalidPayload(format!("Gaau Besi returned no status for {}", tracking_id))
		})?;

		let raw_status = json_string(entry, &["status", "order_status"]).ok_or_else(|| {
			CourierError::InvalidPayload(format!("Gaau Besi status for {} has no status field", tracking_id))
		})?;

		Ok(ProviderStatus {
			tracking_id: tracking_id.to_string(),
			canonical_status: self.config.status_map.translate(&raw_status),
			raw_status,
			location: json_string(entry, &["location", "branch"]),
			remarks: json_string(entry, &["remarks"]),
			timestamp: json_string(entry, &["updated_at", "created_on"]),
		})
	}

	fn normalize_webhook(&self, payload: &Value) -> Result<NormalizedEvent, CourierError> {
		let tracking_id = json_string(payload, &["order_id"])
			.ok_or_else(|| CourierError::InvalidPayload("Gaau Besi webhook has no order_id".to_string()))?;
		let raw_status = json_string(payload, &["status", "order_status"])
			.ok_or_else(|| CourierError::InvalidPayload("Gaau Besi webhook has no status".to_string()))?;

		Ok(NormalizedEvent {
			canonical_status: self.config.status_map.translate(&raw_status),
			event_id: json_string(payload, &["id", "event_id"]),
			remarks: json_string(payload, &["remarks"]),
			location: json_string(payload, &["location", "branch"]),
			timestamp: json_string(payload, &["updated_at", "timestamp"]),
			raw_payload: payload.clone(),
			tracking_id,
			raw_status,
		})
	}

	fn webhook_signature(
		&self,
		headers: &BTreeMap<String, String>,
		payload: &Value,
	) -> Option<String> {
		header_value(headers, SIGNATURE_HEADER).or_else(|| json_string(payload, &["signature"]))
	}

	fn verify_webhook_signature(&self, signature: Option<&str>, payload: &[u8]) -> bool {
		let secret = self.config.webhook_secret.as_deref();
		if verify_shared_secret(GAAUBESI_CODE, secret, signature, payload) {
			return true;
		}
		// Body-carried signatures cover the body without the signature field itself.
		match Self::unsigned_body(payload) {
			Some(unsigned) => verify_shared_secret(GAAUBESI_CODE, secret, signature, &unsigned),
			None => false,
		}
	}
}
