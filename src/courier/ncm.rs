//! Nepal Can Move (NCM) adapter.

use super::adapter::{
	ProviderAdapter, classify_create_response, ensure_accepted, header_value, json_string,
	verify_shared_secret,
};
use super::transport::{HttpRequest, HttpTransport};
use super::types::{
	CancelResult, Capability, CourierError, NormalizedEvent, ProviderConfig, ProviderStatus,
	RateQuery, ShippingRate, SyncResult,
};
use crate::order::{DeliveryType, Order, ValidationError};
use crate::utils::{cod_charge, sanitize_address, sanitize_name, sanitize_phone};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const NCM_CODE: &str = "ncm";

const SIGNATURE_HEADERS: [&str; 2] = ["x-ncm-signature", "x-ncm-token"];

pub struct NcmAdapter {
	config: ProviderConfig,
	transport: Arc<dyn HttpTransport>,
}

impl NcmAdapter {
	pub fn new(config: ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
		Self { config, transport }
	}

	fn authorized(&self, request: HttpRequest) -> HttpRequest {
		match &self.config.api_token {
			Some(token) => request.header("Authorization", format!("Token {}", token)),
			None => request,
		}
	}

	fn delivery_type_code(delivery_type: DeliveryType) -> &'static str {
		match delivery_type {
			DeliveryType::D2D => "Door2Door",
			DeliveryType::D2B => "Door2Branch",
		}
	}

	fn rate_type_code(delivery_type: DeliveryType) -> &'static str {
		match delivery_type {
			DeliveryType::D2D => "Pickup",
			DeliveryType::D2B => "Collect",
		}
	}

	/// Build the create-order body. Fails on fields NCM would reject anyway.
	pub fn build_payload(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<Value, ValidationError> {
		let name = sanitize_name(order.customer_name.as_deref())?;
		let phone = sanitize_phone(
			order
				.phone
				.as_deref()
				.ok_or(ValidationError::MissingCustomerPhone)?,
		)?;
		let phone2 = order
			.secondary_phone
			.as_deref()
			.and_then(|p| sanitize_phone(p).ok())
			.unwrap_or_default();
		let branch = order
			.destination_branch
			.as_deref()
			.map(str::trim)
			.filter(|b| !b.is_empty())
			.ok_or(ValidationError::MissingDestinationBranch)?
			.to_uppercase();
		let address = sanitize_address(order.address.as_deref(), Some(branch.as_str()));
		let cod = cod_charge(order.payable_amount, order.is_cash_on_delivery());

		Ok(json!({
			"name": name,
			"phone": phone,
			"phone2": phone2,
			"cod_charge": cod.to_string(),
			"address": address,
			"fbranch": self.config.source_branch.clone().unwrap_or_default(),
			"branch": branch,
			"package": order.package_description(),
			"vref_id": order.id.to_string(),
			"instruction": "",
			"delivery_type": Self::delivery_type_code(delivery_type),
		}))
	}

	fn status_from_entry(&self, tracking_id: &str, entry: &Value) -> Result<ProviderStatus, CourierError> {
		let raw_status = json_string(entry, &["status", "last_delivery_status"]).ok_or_else(|| {
			CourierError::InvalidPayload(format!("NCM status for {} has no status field", tracking_id))
		})?;

		Ok(ProviderStatus {
			tracking_id: tracking_id.to_string(),
			canonical_status: self.config.status_map.translate(&raw_status),
			raw_status,
			location: json_string(entry, &["location", "branch"]),
			remarks: json_string(entry, &["remarks", "comment"]),
			timestamp: json_string(entry, &["added_time", "timestamp"]),
		})
	}
}

#[async_trait]
impl ProviderAdapter for NcmAdapter {
	fn code(&self) -> &str {
		NCM_CODE
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
		debug!("Pushing order {} to NCM branch {}", order.id, payload["branch"]);

		let request = self.authorized(HttpRequest::post(self.config.endpoint("order/create"), payload));
		let response = self.transport.send(request).await?;
		let tracking_id = classify_create_response(&response, &["orderid", "order_id"])?;

		let waybill = json_string(&response.body, &["waybill", "awb"]).unwrap_or_else(|| tracking_id.clone());
		let message = json_string(&response.body, &["Message", "message"])
			.unwrap_or_else(|| "Order Created".to_string());

		info!("NCM accepted order {} as {}", order.id, tracking_id);
		Ok(SyncResult {
			provider: NCM_CODE.to_string(),
			tracking_id,
			waybill,
			message,
			delivery_type,
			raw_response: response.body,
		})
	}

	async fn pull_status(&self, tracking_id: &str) -> Result<ProviderStatus, CourierError> {
		let request = self.authorized(
			HttpRequest::get(self.config.endpoint("order/status")).query("id", tracking_id),
		);
		let response = self.transport.send(request).await?;
		ensure_accepted(&response)?;

		// Status history comes back newest first.
		let latest = match &response.body {
			Value::Array(entries) => entries.first().ok_or_else(|| {
				CourierError::InvalidPayload(format!("NCM returned no status history for {}", tracking_id))
			})?,
			other => other,
		};
		self.status_from_entry(tracking_id, latest)
	}

	async fn cancel_shipment(
		&self,
		tracking_id: &str,
		reason: &str,
	) -> Result<Capability<CancelResult>, CourierError> {
		let request = self.authorized(HttpRequest::post(
			self.config.endpoint("order/cancel"),
			json!({ "orderid": tracking_id, "reason": reason }),
		));
		let response = self.transport.send(request).await?;
		ensure_accepted(&response)?;

		Ok(Capability::Supported(CancelResult {
			tracking_id: tracking_id.to_string(),
			message: json_string(&response.body, &["Message", "message"])
				.unwrap_or_else(|| "Order cancelled".to_string()),
		}))
	}

	async fn shipping_rates(
		&self,
		query: &RateQuery,
	) -> Result<Capability<ShippingRate>, CourierError> {
		let source = query
			.source_branch
			.clone()
			.or_else(|| self.config.source_branch.clone())
			.ok_or_else(|| CourierError::Config("NCM source branch is not configured".to_string()))?;

		let request = self.authorized(
			HttpRequest::get(self.config.endpoint("shipping-rate"))
				.query("creation", source.clone())
				.query("destination", query.destination_branch.clone())
				.query("type", Self::rate_type_code(query.delivery_type)),
		);
		let response = self.transport.send(request).await?;
		ensure_accepted(&response)?;

		let charge = json_string(&response.body, &["charge", "rate"])
			.and_then(|c| c.parse::<f64>().ok())
			.ok_or_else(|| CourierError::InvalidPayload("NCM rate response has no charge".to_string()))?;

		Ok(Capability::Supported(ShippingRate {
			source_branch: source,
			destination_branch: query.destination_branch.clone(),
			delivery_type: query.delivery_type,
			charge,
		}))
	}

	fn normalize_webhook(&self, payload: &Value) -> Result<NormalizedEvent, CourierError> {
		let tracking_id = json_string(payload, &["order_id", "orderid"])
			.ok_or_else(|| CourierError::InvalidPayload("NCM webhook has no order_id".to_string()))?;
		let raw_status = json_string(payload, &["status"])
			.ok_or_else(|| CourierError::InvalidPayload("NCM webhook has no status".to_string()))?;

		Ok(NormalizedEvent {
			canonical_status: self.config.status_map.translate(&raw_status),
			// `id` on NCM callbacks is the shipment, not the event.
			event_id: json_string(payload, &["event_id"]),
			remarks: json_string(payload, &["remarks", "comment"]),
			location: json_string(payload, &["location", "branch"]),
			timestamp: json_string(payload, &["timestamp", "added_time"]),
			raw_payload: payload.clone(),
			tracking_id,
			raw_status,
		})
	}

	fn webhook_signature(
		&self,
		headers: &BTreeMap<String, String>,
		_payload: &Value,
	) -> Option<String> {
		SIGNATURE_HEADERS
			.iter()
			.find_map(|name| header_value(headers, name))
	}

	fn verify_webhook_signature(&self, signature: Option<&str>, payload: &[u8]) -> bool {
		verify_shared_secret(NCM_CODE, self.config.webhook_secret.as_deref(), signature, payload)
	}
}
