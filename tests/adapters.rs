mod common;

use common::*;
use courier_sync::courier::{
	CanonicalStatus, CourierError, GaauBesiAdapter, HttpMethod, ProviderAdapter,
};
use courier_sync::order::{DeliveryType, OrderItem};
use serde_json::json;

#[tokio::test]
async fn test_ncm_push_builds_courier_payload() {
	let transport = ScriptedTransport::new();
	transport.respond(200, json!({"Message": "Order Successfully Created", "orderid": 4521}));
	let adapter = ncm_adapter(transport.clone());

	let mut order = ready_order();
	order.secondary_phone = Some("01-4412345".to_string());
	order.address = Some("   ".to_string());
	order.items = vec![OrderItem {
		product_name: "Dhaka Topi".to_string(),
		variant: Some("Black".to_string()),
		sku: None,
		quantity: 2,
	}];

	let result = adapter.push_order(&order, DeliveryType::D2D).await.unwrap();
	assert_eq!(result.tracking_id, "4521");
	assert_eq!(result.waybill, "4521");
	assert_eq!(result.provider, "ncm");

	let request = transport.last_request();
	assert_eq!(request.method, HttpMethod::Post);
	let body = request.body.unwrap();
	assert_eq!(body["delivery_type"], "Door2Door");
	// Too short for a mobile number, so it is left out rather than failing the push.
	assert_eq!(body["phone2"], "");
	assert_eq!(body["address"], "POKHARA");
	assert_eq!(body["package"], "2 x Dhaka Topi (Black)");
}

#[tokio::test]
async fn test_ncm_non_cod_order_collects_nothing() {
	let transport = ScriptedTransport::new();
	transport.respond(200, json!({"orderid": "NCM1"}));
	let adapter = ncm_adapter(transport.clone());

	let mut order = ready_order();
	order.payment_method = Some("eSewa".to_string());
	adapter.push_order(&order, DeliveryType::D2B).await.unwrap();

	assert_eq!(transport.last_request().body.unwrap()["cod_charge"], "0");
}

#[tokio::test]
async fn test_ncm_validation_happens_before_any_request() {
	let transport = ScriptedTransport::new();
	let adapter = ncm_adapter(transport.clone());

	let mut order = ready_order();
	order.destination_branch = None;
	assert!(matches!(
		adapter.push_order(&order, DeliveryType::D2D).await,
		Err(CourierError::Validation(_))
	));
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_ncm_transport_failure_is_unavailable() {
	let transport = ScriptedTransport::new();
	transport.fail(CourierError::Unavailable("connection reset".to_string()));
	let adapter = ncm_adapter(transport);

	assert!(matches!(
		adapter.push_order(&ready_order(), DeliveryType::D2D).await,
		Err(CourierError::Unavailable(_))
	));
}

#[tokio::test]
async fn test_ncm_status_pull_reads_newest_entry() {
	let transport = ScriptedTransport::new();
	transport.respond(
		200,
		json!([
			{"status": "Sent for Delivery", "added_time": "2024-05-02 09:10", "location": "POKHARA"},
			{"status": "Dispatched", "added_time": "2024-05-01 18:00"}
		]),
	);
	let adapter = ncm_adapter(transport);

	let status = adapter.pull_status("NCM555").await.unwrap();
	assert_eq!(status.raw_status, "Sent for Delivery");
	assert_eq!(status.canonical_status, CanonicalStatus::OutForDelivery);
	assert_eq!(status.location.as_deref(), Some("POKHARA"));
	assert_eq!(status.timestamp.as_deref(), Some("2024-05-02 09:10"));
}

#[tokio::test]
async fn test_ncm_unmapped_status_is_unknown() {
	let transport = ScriptedTransport::new();
	transport.respond(200, json!([{"status": "Sorting Hub Scan"}]));
	let adapter = ncm_adapter(transport);

	let status = adapter.pull_status("NCM555").await.unwrap();
	assert_eq!(status.canonical_status, CanonicalStatus::Unknown);
	assert_eq!(status.raw_status, "Sorting Hub Scan");
}

#[tokio::test]
async fn test_gaaubesi_push_and_rejection() {
	let transport = ScriptedTransport::new();
	let adapter = GaauBesiAdapter::new(provider_config("gaaubesi", None), transport.clone());

	transport.respond(200, json!({"success": true, "order_id": 88231, "message": "Order created"}));
	let result = adapter.push_order(&ready_order(), DeliveryType::D2B).await.unwrap();
	assert_eq!(result.tracking_id, "88231");
	assert_eq!(result.message, "Order created");

	let request = transport.last_request();
	assert_eq!(request.url, "https://gaaubesi.courier.test/api/order/create/");
	let body = request.body.unwrap();
	assert_eq!(body["delivery_type"], "Pickup");
	assert_eq!(body["cod_charge"], 1200);
	assert_eq!(body["receiver_number"], "9845123456");
	assert_eq!(body["destination_branch"], "POKHARA");

	transport.respond(200, json!({"success": false, "message": "Branch not serviceable"}));
	match adapter.push_order(&ready_order(), DeliveryType::D2D).await {
		Err(CourierError::Rejected { message, .. }) => assert_eq!(message, "Branch not serviceable"),
		other => panic!("expected rejection, got {other:?}"),
	}
}

#[tokio::test]
async fn test_gaaubesi_optional_capabilities_are_unsupported() {
	let transport = ScriptedTransport::new();
	let adapter = GaauBesiAdapter::new(provider_config("gaaubesi", None), transport.clone());

	assert!(!adapter.cancel_shipment("88231", "duplicate").await.unwrap().is_supported());
	assert!(
		!adapter
			.request_pickup(&Default::default())
			.await
			.unwrap()
			.is_supported()
	);
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_gaaubesi_status_history_reads_latest() {
	let transport = ScriptedTransport::new();
	transport.respond(
		200,
		json!({"status": [
			{"status": "Order Placed", "created_on": "2024-05-01"},
			{"status": "Customer Not Reachable", "remarks": "Phone switched off"}
		]}),
	);
	let adapter = GaauBesiAdapter::new(provider_config("gaaubesi", None), transport.clone());

	let status = adapter.pull_status("88231").await.unwrap();
	assert_eq!(status.canonical_status, CanonicalStatus::FailedAttempt);
	assert_eq!(status.remarks.as_deref(), Some("Phone switched off"));
	assert_eq!(
		transport.last_request().query,
		vec![("order_id".to_string(), "88231".to_string())]
	);
}
