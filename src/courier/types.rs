//! Types for courier integration: push results, pulled statuses and webhook events

use super::status_map::StatusMap;
use crate::order::{DeliveryType, ValidationError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical shipment status shared by every courier.
///
/// Each provider's raw vocabulary is translated into one of these values through its
/// [`StatusMap`](super::StatusMap). Anything the map does not recognize becomes `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
	/// Shipment registered with the courier, not yet collected
	Pending,
	/// Courier collected the parcel from the vendor
	PickedUp,
	/// Moving between courier branches
	InTransit,
	/// Rider is on the way to the customer
	OutForDelivery,
	/// Handed to the customer
	Delivered,
	/// A delivery attempt failed, parcel still with the courier
	FailedAttempt,
	/// Parcel is travelling back to the vendor
	Returning,
	/// Parcel is back with the vendor
	Returned,
	/// Shipment cancelled on the courier's books
	Cancelled,
	/// Raw status not present in the provider's map
	Unknown,
}

impl CanonicalStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			CanonicalStatus::Pending => "pending",
			CanonicalStatus::PickedUp => "picked_up",
			CanonicalStatus::InTransit => "in_transit",
			CanonicalStatus::OutForDelivery => "out_for_delivery",
			CanonicalStatus::Delivered => "delivered",
			CanonicalStatus::FailedAttempt => "failed_attempt",
			CanonicalStatus::Returning => "returning",
			CanonicalStatus::Returned => "returned",
			CanonicalStatus::Cancelled => "cancelled",
			CanonicalStatus::Unknown => "unknown",
		}
	}

	/// Parse a canonical status name, as used in configured status maps.
	pub fn parse(value: &str) -> Option<Self> {
		let status = match value.trim().to_ascii_lowercase().as_str() {
			"pending" => CanonicalStatus::Pending,
			"picked_up" => CanonicalStatus::PickedUp,
			"in_transit" => CanonicalStatus::InTransit,
			"out_for_delivery" => CanonicalStatus::OutForDelivery,
			"delivered" => CanonicalStatus::Delivered,
			"failed_attempt" => CanonicalStatus::FailedAttempt,
			"returning" => CanonicalStatus::Returning,
			"returned" => CanonicalStatus::Returned,
			"cancelled" => CanonicalStatus::Cancelled,
			"unknown" => CanonicalStatus::Unknown,
			_ => return None,
		};
		Some(status)
	}
}

impl fmt::Display for CanonicalStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Connection details and vocabulary for one courier.
///
/// Fetched once per provider code from the configuration source and cached by the registry for the
/// life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
	/// Registry code, lower-case (`ncm`, `gaaubesi`, `dummy`).
	pub code: String,
	pub display_name: String,
	pub base_url: String,
	/// API credential. Never logged.
	pub api_token: Option<String>,
	/// Branch the vendor ships from.
	pub source_branch: Option<String>,
	/// Shared secret for webhook authentication. `None` disables the check.
	pub webhook_secret: Option<String>,
	pub status_map: StatusMap,
}

impl ProviderConfig {
	/// Join `path` onto the base URL with exactly one slash between them.
	pub fn endpoint(&self, path: &str) -> String {
		format!(
			"{}/{}",
			self.base_url.trim_end_matches('/'),
			path.trim_start_matches('/')
		)
	}
}

/// Result of a successful create-shipment call.
///
/// Transient: the orchestrator turns it into an order update and keeps `raw_response` only as an
/// opaque audit blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
	/// Registry code of the provider that accepted the order.
	pub provider: String,
	/// The courier's identifier for the shipment.
	pub tracking_id: String,
	/// Printable consignment id. Falls back to the tracking id when the courier issues none.
	pub waybill: String,
	/// Human readable message from the courier, or a default.
	pub message: String,
	/// Delivery type the shipment was booked with.
	pub delivery_type: DeliveryType,
	/// Body returned by the courier.
	pub raw_response: serde_json::Value,
}

/// Snapshot of a shipment's state as reported by the courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
	pub tracking_id: String,
	pub raw_status: String,
	pub canonical_status: CanonicalStatus,
	pub location: Option<String>,
	pub remarks: Option<String>,
	pub timestamp: Option<String>,
}

/// A courier callback translated into provider-independent fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
	pub tracking_id: String,
	/// Courier-issued id of this event, when the courier sends one.
	pub event_id: Option<String>,
	pub raw_status: String,
	pub canonical_status: CanonicalStatus,
	pub remarks: Option<String>,
	pub location: Option<String>,
	pub timestamp: Option<String>,
	pub raw_payload: serde_json::Value,
}

/// Outcome of an optional courier capability.
///
/// Couriers without API support for an operation answer `Unsupported` instead of failing, so the
/// caller can show a graceful message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Capability<T> {
	Supported(T),
	Unsupported { provider: String, operation: String },
}

impl<T> Capability<T> {
	pub fn unsupported(provider: &str, operation: &str) -> Self {
		Capability::Unsupported {
			provider: provider.to_string(),
			operation: operation.to_string(),
		}
	}

	pub fn is_supported(&self) -> bool {
		matches!(self, Capability::Supported(_))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResult {
	pub tracking_id: String,
	pub message: String,
}

/// Details for asking a courier to collect parcels from the vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PickupRequest {
	pub branch: Option<String>,
	pub contact_name: Option<String>,
	pub contact_phone: Option<String>,
	pub package_count: u32,
	pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupResult {
	pub reference: String,
	pub message: String,
}

/// Parameters for a simple rate lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateQuery {
	/// Origin branch. Defaults to the provider's configured source branch.
	pub source_branch: Option<String>,
	pub destination_branch: String,
	pub delivery_type: DeliveryType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingRate {
	pub source_branch: String,
	pub destination_branch: String,
	pub delivery_type: DeliveryType,
	pub charge: f64,
}

/// Error types for courier operations
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
	/// Network failure, timeout or a 5xx from the courier. Safe for the caller to retry.
	#[error("Courier unavailable: {0}")]
	Unavailable(String),

	/// The courier refused the request on business grounds.
	#[error("{message}")]
	Rejected {
		message: String,
		response: serde_json::Value,
	},

	#[error("Unknown logistics provider: {0}")]
	UnknownProvider(String),

	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error("Invalid courier payload: {0}")]
	InvalidPayload(String),

	#[error("Provider configuration error: {0}")]
	Config(String),

	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
}

impl CourierError {
	pub fn rejected(message: impl Into<String>, response: serde_json::Value) -> Self {
		CourierError::Rejected {
			message: message.into(),
			response,
		}
	}
}
