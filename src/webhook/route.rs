//! HTTP endpoints for courier callbacks
//!
//! POST /webhooks/{provider} and POST /webhooks (raw body, for signature verification)

use super::intake::{WebhookIntake, WebhookOutcome, WebhookRequest};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn webhook_router(intake: Arc<WebhookIntake>) -> Router {
	Router::new()
		.route("/webhooks", post(handle_unrouted))
		.route("/webhooks/{provider}", post(handle_provider))
		.with_state(intake)
}

async fn handle_provider(
	State(intake): State<Arc<WebhookIntake>>,
	Path(provider): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> (StatusCode, Json<Value>) {
	let request = to_request(&headers, body);
	respond(intake.handle_request(&provider, &request).await)
}

async fn handle_unrouted(
	State(intake): State<Arc<WebhookIntake>>,
	headers: HeaderMap,
	body: Bytes,
) -> (StatusCode, Json<Value>) {
	let request = to_request(&headers, body);
	respond(intake.handle_unrouted(&request).await)
}

fn to_request(headers: &HeaderMap, body: Bytes) -> WebhookRequest {
	// Non-UTF-8 header values are dropped.
	let headers: BTreeMap<String, String> = headers
		.iter()
		.filter_map(|(name, value)| {
			value
				.to_str()
				.ok()
				.map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
		})
		.collect();

	WebhookRequest {
		headers,
		body: body.to_vec(),
	}
}

fn respond(outcome: WebhookOutcome) -> (StatusCode, Json<Value>) {
	let status = StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::OK);
	(
		status,
		Json(json!({
			"status": outcome.log_status().as_str(),
			"order_id": outcome.order_id(),
		})),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_to_request_lowercases_headers() {
		let mut headers = HeaderMap::new();
		headers.insert(
			axum::http::HeaderName::from_bytes(b"X-NCM-Signature").unwrap(),
			"abc".parse().unwrap(),
		);
		let request = to_request(&headers, Bytes::from_static(b"{}"));
		assert_eq!(request.headers["x-ncm-signature"], "abc");
		assert_eq!(request.body, b"{}");
	}

	#[test]
	fn test_unauthorized_maps_to_401() {
		let (status, Json(body)) = respond(WebhookOutcome::Unauthorized);
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["status"], "unauthorized");

		let (status, _) = respond(WebhookOutcome::ProviderUnknown);
		assert_eq!(status, StatusCode::OK);
	}
}
