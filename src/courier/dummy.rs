//! In-process test courier.
//!
//! Never touches the network. Tracking ids are derived from the order id so repeated runs against
//! the same data are reproducible.

use super::adapter::{ProviderAdapter, header_value, json_string};
use super::types::{
	CancelResult, Capability, CourierError, NormalizedEvent, PickupRequest, PickupResult,
	ProviderConfig, ProviderStatus, RateQuery, ShippingRate, SyncResult,
};
use crate::order::{DeliveryType, Order, ValidationError};
use crate::utils::{sanitize_name, sanitize_phone};

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const DUMMY_CODE: &str = "dummy";

/// Base URL used when none is configured. Never requested.
pub const DUMMY_BASE_URL: &str = "http://dummy.courier.local";

const PENDING_PICKUP: &str = "Pending Pickup";
const SIGNATURE_HEADER: &str = "x-dummy-signature";

pub struct DummyAdapter {
	config: ProviderConfig,
}

impl DummyAdapter {
	pub fn new(config: ProviderConfig) -> Self {
		Self { config }
	}

	/// `DUMMY-` followed by the first eight hex digits of the order id, upper-case.
	pub fn tracking_id_for(order: &Order) -> String {
		let simple = order.id.simple().to_string();
		format!("DUMMY-{}", simple[..8].to_ascii_uppercase())
	}
}

#[async_trait]
impl ProviderAdapter for DummyAdapter {
	fn code(&self) -> &str {
		DUMMY_CODE
	}

	fn display_name(&self) -> &str {
		&self.config.display_name
	}

	async fn push_order(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<SyncResult, CourierError> {
		// Same field checks as a real courier so flows behave alike.
		sanitize_name(order.customer_name.as_deref())?;
		sanitize_phone(
			order
				.phone
				.as_deref()
				.ok_or(ValidationError::MissingCustomerPhone)?,
		)?;

		let tracking_id = Self::tracking_id_for(order);
		info!("Dummy courier booked order {} as {}", order.id, tracking_id);

		Ok(SyncResult {
			provider: DUMMY_CODE.to_string(),
			waybill: tracking_id.clone(),
			message: "Order Created".to_string(),
			delivery_type,
			raw_response: json!({
				"tracking_id": tracking_id,
				"delivery_type": delivery_type.as_str(),
			}),
			tracking_id,
		})
	}

	async fn pull_status(&self, tracking_id: &str) -> Result<ProviderStatus, CourierError> {
		Ok(ProviderStatus {
			tracking_id: tracking_id.to_string(),
			raw_status: PENDING_PICKUP.to_string(),
			canonical_status: self.config.status_map.translate(PENDING_PICKUP),
			location: self.config.source_branch.clone(),
			remarks: None,
			timestamp: Some(chrono::Utc::now().to_rfc3339()),
		})
	}

	async fn cancel_shipment(
		&self,
		tracking_id: &str,
		reason: &str,
	) -> Result<Capability<CancelResult>, CourierError> {
		Ok(Capability::Supported(CancelResult {
			tracking_id: tracking_id.to_string(),
			message: format!("Cancelled: {}", reason),
		}))
	}

	async fn request_pickup(
		&self,
		request: &PickupRequest,
	) -> Result<Capability<PickupResult>, CourierError> {
		Ok(Capability::Supported(PickupResult {
			reference: format!("PICKUP-{}", request.package_count),
			message: "Pickup scheduled".to_string(),
		}))
	}

	async fn shipping_rates(
		&self,
		query: &RateQuery,
	) -> Result<Capability<ShippingRate>, CourierError> {
		let charge = match query.delivery_type {
			DeliveryType::D2D => 150.0,
			DeliveryType::D2B => 100.0,
		};
		Ok(Capability::Supported(ShippingRate {
			source_branch: query
				.source_branch
				.clone()
				.or_else(|| self.config.source_branch.clone())
				.unwrap_or_else(|| "HEAD OFFICE".to_string()),
			destination_branch: query.destination_branch.clone(),
			delivery_type: query.delivery_type,
			charge,
		}))
	}

	fn normalize_webhook(&self, payload: &Value) -> Result<NormalizedEvent, CourierError> {
		let tracking_id = json_string(payload, &["tracking_id"])
			.ok_or_else(|| CourierError::InvalidPayload("Dummy webhook has no tracking_id".to_string()))?;
		let raw_status = json_string(payload, &["status"])
			.ok_or_else(|| CourierError::InvalidPayload("Dummy webhook has no status".to_string()))?;

		Ok(NormalizedEvent {
			canonical_status: self.config.status_map.translate(&raw_status),
			event_id: json_string(payload, &["event_id"]),
			remarks: json_string(payload, &["remarks"]),
			location: json_string(payload, &["location"]),
			timestamp: json_string(payload, &["timestamp"]),
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

	fn verify_webhook_signature(&self, signature: Option<&str>, _payload: &[u8]) -> bool {
		match self.config.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
			None => {
				warn!("No webhook secret configured for {}, accepting unsigned callback", DUMMY_CODE);
				true
			}
			Some(secret) => signature.map(str::trim) == Some(secret),
		}
	}
}
