use crate::courier::{CanonicalStatus, CourierError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Home delivery vs. collection at a courier branch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeliveryType {
	/// Door to door
	D2D,
	/// Door to branch
	D2B,
}

impl DeliveryType {
	pub fn as_str(&self) -> &'static str {
		match self {
			DeliveryType::D2D => "D2D",
			DeliveryType::D2B => "D2B",
		}
	}
}

impl fmt::Display for DeliveryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Pending,
	Confirmed,
	Processing,
	HandoverToCourier,
	PickedUp,
	InTransit,
	OutForDelivery,
	Delivered,
	Returning,
	Returned,
	Cancelled,
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Confirmed => "confirmed",
			OrderStatus::Processing => "processing",
			OrderStatus::HandoverToCourier => "handover_to_courier",
			OrderStatus::PickedUp => "picked_up",
			OrderStatus::InTransit => "in_transit",
			OrderStatus::OutForDelivery => "out_for_delivery",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Returning => "returning",
			OrderStatus::Returned => "returned",
			OrderStatus::Cancelled => "cancelled",
		}
	}

	/// Position along the fulfillment path. Courier updates may only move an order to a higher rank.
	pub fn rank(&self) -> u8 {
		match self {
			OrderStatus::Pending => 0,
			OrderStatus::Confirmed => 1,
			OrderStatus::Processing => 2,
			OrderStatus::HandoverToCourier => 3,
			OrderStatus::PickedUp => 4,
			OrderStatus::InTransit => 5,
			OrderStatus::OutForDelivery => 6,
			OrderStatus::Returning => 7,
			OrderStatus::Delivered => 8,
			OrderStatus::Returned => 9,
			OrderStatus::Cancelled => 9,
		}
	}

	pub fn is_forward_from(&self, current: OrderStatus) -> bool {
		self.rank() > current.rank()
	}

	/// Order status implied by a courier status. `None` when the courier status carries no
	/// lifecycle meaning (failed attempts, unknown codes).
	pub fn from_canonical(status: CanonicalStatus) -> Option<Self> {
		match status {
			CanonicalStatus::Pending => Some(OrderStatus::HandoverToCourier),
			CanonicalStatus::PickedUp => Some(OrderStatus::PickedUp),
			CanonicalStatus::InTransit => Some(OrderStatus::InTransit),
			CanonicalStatus::OutForDelivery => Some(OrderStatus::OutForDelivery),
			CanonicalStatus::Delivered => Some(OrderStatus::Delivered),
			CanonicalStatus::Returning => Some(OrderStatus::Returning),
			CanonicalStatus::Returned => Some(OrderStatus::Returned),
			CanonicalStatus::Cancelled => Some(OrderStatus::Cancelled),
			CanonicalStatus::FailedAttempt | CanonicalStatus::Unknown => None,
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Who fulfills the order. Only externally fulfilled orders are pushed to couriers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
	#[default]
	Local,
	External,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
	pub product_name: String,
	pub variant: Option<String>,
	pub sku: Option<String>,
	pub quantity: u32,
}

/// The order record owned by the order store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
	pub id: Uuid,
	pub customer_name: Option<String>,
	pub phone: Option<String>,
	pub secondary_phone: Option<String>,
	pub address: Option<String>,
	pub total_amount: f64,
	pub payable_amount: f64,
	pub payment_method: Option<String>,
	/// Free-text courier name as entered by staff.
	pub courier_partner: Option<String>,
	/// Courier-specific destination branch code.
	pub destination_branch: Option<String>,
	/// Persisted delivery type. Free text in older records (`"home delivery"`, `"branch pickup"`).
	pub delivery_type: Option<String>,
	pub fulfillment_type: FulfillmentType,
	pub status: OrderStatus,
	pub is_logistics_synced: bool,
	pub external_order_id: Option<String>,
	pub waybill: Option<String>,
	pub logistics_provider: Option<String>,
	pub logistics_status: Option<String>,
	pub logistics_synced_at: Option<DateTime<Utc>>,
	/// Opaque courier response or recorded failure, kept for audit.
	pub logistics_response: Option<serde_json::Value>,
	pub items: Vec<OrderItem>,
}

impl Order {
	/// A fresh, unsynced order with the given id. Convenient for stores and tests.
	pub fn new(id: Uuid) -> Self {
		Self {
			id,
			customer_name: None,
			phone: None,
			secondary_phone: None,
			address: None,
			total_amount: 0.0,
			payable_amount: 0.0,
			payment_method: None,
			courier_partner: None,
			destination_branch: None,
			delivery_type: None,
			fulfillment_type: FulfillmentType::default(),
			status: OrderStatus::Pending,
			is_logistics_synced: false,
			external_order_id: None,
			waybill: None,
			logistics_provider: None,
			logistics_status: None,
			logistics_synced_at: None,
			logistics_response: None,
			items: Vec::new(),
		}
	}

	/// True once a courier has accepted the order and the store holds its external id.
	pub fn is_synced(&self) -> bool {
		self.is_logistics_synced && self.external_order_id.is_some()
	}

	pub fn is_cash_on_delivery(&self) -> bool {
		self.payment_method
			.as_deref()
			.map(|method| method.trim().eq_ignore_ascii_case("cod"))
			.unwrap_or(false)
	}

	/// One line package description built from the item list, e.g. `"2 x Tea (Green)"`.
	pub fn package_description(&self) -> String {
		self.items
			.iter()
			.map(|item| match &item.variant {
				Some(variant) if !variant.trim().is_empty() => {
					format!("{} x {} ({})", item.quantity, item.product_name, variant.trim())
				}
				_ => format!("{} x {}", item.quantity, item.product_name),
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

/// Partial update of an order. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderUpdate {
	pub is_logistics_synced: Option<bool>,
	pub external_order_id: Option<String>,
	pub waybill: Option<String>,
	pub logistics_provider: Option<String>,
	pub logistics_status: Option<String>,
	pub logistics_synced_at: Option<DateTime<Utc>>,
	pub logistics_response: Option<serde_json::Value>,
	pub delivery_type: Option<String>,
	pub status: Option<OrderStatus>,
}

impl OrderUpdate {
	pub fn apply_to(&self, order: &mut Order) {
		if let Some(synced) = self.is_logistics_synced {
			order.is_logistics_synced = synced;
		}
		if let Some(external_order_id) = &self.external_order_id {
			order.external_order_id = Some(external_order_id.clone());
		}
		if let Some(waybill) = &self.waybill {
			order.waybill = Some(waybill.clone());
		}
		if let Some(provider) = &self.logistics_provider {
			order.logistics_provider = Some(provider.clone());
		}
		if let Some(status) = &self.logistics_status {
			order.logistics_status = Some(status.clone());
		}
		if let Some(synced_at) = self.logistics_synced_at {
			order.logistics_synced_at = Some(synced_at);
		}
		if let Some(response) = &self.logistics_response {
			order.logistics_response = Some(response.clone());
		}
		if let Some(delivery_type) = &self.delivery_type {
			order.delivery_type = Some(delivery_type.clone());
		}
		if let Some(status) = self.status {
			order.status = status;
		}
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommentSource {
	Courier,
	System,
}

/// An entry in the order's activity feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderComment {
	pub id: Uuid,
	pub order_id: Uuid,
	pub source: CommentSource,
	pub body: String,
	/// Courier event id the comment was created from. Used to discard redelivered webhooks.
	pub external_event_id: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl OrderComment {
	pub fn courier(order_id: Uuid, body: String, external_event_id: Option<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			order_id,
			source: CommentSource::Courier,
			body,
			external_event_id,
			created_at: Utc::now(),
		}
	}
}

/// Missing or malformed order fields. Never retried; shown to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("Order is not marked for external fulfillment")]
	InvalidFulfillmentType,

	#[error("Order has no courier partner assigned")]
	MissingCourierPartner,

	#[error("Customer name is required")]
	MissingCustomerName,

	#[error("Customer phone is required")]
	MissingCustomerPhone,

	#[error("Customer address is required")]
	MissingCustomerAddress,

	#[error("Destination branch is required")]
	MissingDestinationBranch,

	#[error("Invalid phone number {0:?}: expected 10 digits")]
	InvalidPhone(String),
}

/// Failures of the order store and webhook log collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
	#[error("Record not found: {0}")]
	NotFound(String),

	#[error("Record {0} is final and cannot be changed")]
	Immutable(String),

	#[error("Storage backend error: {0}")]
	Backend(String),
}

/// Errors surfaced by the logistics façade
#[derive(Debug, thiserror::Error)]
pub enum LogisticsError {
	#[error("Invalid order id: {0}")]
	InvalidOrderId(String),

	#[error("Order not found: {0}")]
	OrderNotFound(Uuid),

	#[error("Order {order_id} is already synced with external id {external_order_id}")]
	AlreadySynced {
		order_id: Uuid,
		external_order_id: String,
	},

	#[error("Order {0} has not been pushed to a courier")]
	NotSynced(Uuid),

	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(transparent)]
	Courier(#[from] CourierError),

	#[error(
		"Courier accepted order {order_id} as {external_order_id} but the order record could not be verified"
	)]
	PersistenceVerificationFailed {
		order_id: Uuid,
		external_order_id: String,
	},

	#[error("Order store error: {0}")]
	Store(#[from] StoreError),
}

impl LogisticsError {
	/// Stable machine readable code, stored with recorded failures.
	pub fn code(&self) -> &'static str {
		match self {
			LogisticsError::InvalidOrderId(_) => "INVALID_ORDER_ID",
			LogisticsError::OrderNotFound(_) => "ORDER_NOT_FOUND",
			LogisticsError::AlreadySynced { .. } => "ALREADY_SYNCED",
			LogisticsError::NotSynced(_) => "NOT_SYNCED",
			LogisticsError::Validation(_)
			| LogisticsError::Courier(CourierError::Validation(_)) => "VALIDATION_ERROR",
			LogisticsError::Courier(CourierError::Unavailable(_)) => "PROVIDER_UNAVAILABLE",
			LogisticsError::Courier(CourierError::Rejected { .. }) => "PROVIDER_REJECTED",
			LogisticsError::Courier(CourierError::UnknownProvider(_)) => "UNKNOWN_PROVIDER",
			LogisticsError::Courier(CourierError::InvalidPayload(_))
			| LogisticsError::Courier(CourierError::JsonError(_)) => "INVALID_PROVIDER_RESPONSE",
			LogisticsError::Courier(CourierError::Config(_)) => "PROVIDER_CONFIG_ERROR",
			LogisticsError::PersistenceVerificationFailed { .. } => "PERSISTENCE_VERIFICATION_FAILED",
			LogisticsError::Store(_) => "STORE_ERROR",
		}
	}

	/// Whether the failure belongs in the order's audit trail.
	///
	/// Validation and conflict errors are expected user-facing conditions and are not recorded.
	pub fn is_recordable(&self) -> bool {
		match self {
			LogisticsError::Courier(CourierError::Validation(_)) => false,
			LogisticsError::Courier(_)
			| LogisticsError::PersistenceVerificationFailed { .. }
			| LogisticsError::Store(_) => true,
			_ => false,
		}
	}

	/// Whether the caller may retry the same request later.
	pub fn is_retryable(&self) -> bool {
		matches!(self, LogisticsError::Courier(CourierError::Unavailable(_)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_forward_progress_ordering() {
		assert!(OrderStatus::Delivered.is_forward_from(OrderStatus::InTransit));
		assert!(!OrderStatus::PickedUp.is_forward_from(OrderStatus::Delivered));
		assert!(!OrderStatus::InTransit.is_forward_from(OrderStatus::InTransit));
		assert!(OrderStatus::HandoverToCourier.is_forward_from(OrderStatus::Confirmed));
		assert!(!OrderStatus::Returning.is_forward_from(OrderStatus::Delivered));
	}

	#[test]
	fn test_status_serializes_snake_case() {
		let json = serde_json::to_value(OrderStatus::HandoverToCourier).unwrap();
		assert_eq!(json, serde_json::json!("handover_to_courier"));
		assert_eq!(OrderStatus::HandoverToCourier.to_string(), "handover_to_courier");
	}

	#[test]
	fn test_update_leaves_unset_fields_alone() {
		let mut order = Order::new(Uuid::new_v4());
		order.customer_name = Some("Sita".to_string());
		order.delivery_type = Some("home".to_string());

		OrderUpdate {
			is_logistics_synced: Some(true),
			external_order_id: Some("NCM1".to_string()),
			..Default::default()
		}
		.apply_to(&mut order);

		assert!(order.is_synced());
		assert_eq!(order.customer_name.as_deref(), Some("Sita"));
		assert_eq!(order.delivery_type.as_deref(), Some("home"));
		assert_eq!(order.status, OrderStatus::Pending);
	}

	#[test]
	fn test_package_description() {
		let mut order = Order::new(Uuid::new_v4());
		order.items = vec![
			OrderItem {
				product_name: "Tea".to_string(),
				variant: Some("Green".to_string()),
				sku: None,
				quantity: 2,
			},
			OrderItem {
				product_name: "Mug".to_string(),
				variant: None,
				sku: Some("MUG-1".to_string()),
				quantity: 1,
			},
		];
		assert_eq!(order.package_description(), "2 x Tea (Green), 1 x Mug");
	}

	#[test]
	fn test_error_codes_and_recording_policy() {
		let rejected = LogisticsError::from(CourierError::rejected("Phone Number: bad", serde_json::Value::Null));
		assert_eq!(rejected.code(), "PROVIDER_REJECTED");
		assert!(rejected.is_recordable());
		assert!(!rejected.is_retryable());

		let unavailable = LogisticsError::from(CourierError::Unavailable("timeout".to_string()));
		assert!(unavailable.is_retryable());

		let validation = LogisticsError::from(ValidationError::MissingCustomerPhone);
		assert!(!validation.is_recordable());
		assert_eq!(validation.to_string(), "Customer phone is required");
	}
}
