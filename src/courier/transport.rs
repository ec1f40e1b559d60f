//!
//! Outbound HTTP transport for courier APIs.
//!
//! Adapters never talk to `reqwest` directly: they build an [`HttpRequest`] and hand it to an
//! [`HttpTransport`]. The production implementation wraps a shared `reqwest::Client` with a bounded
//! timeout; tests substitute a scripted transport.

use super::types::CourierError;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a courier call.
pub const DEFAULT_COURIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
	Get,
	Post,
}

/// A JSON request to a courier endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
	pub method: HttpMethod,
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub query: Vec<(String, String)>,
	pub body: Option<serde_json::Value>,
	/// Per-call timeout. `None` uses the transport default.
	pub timeout: Option<Duration>,
}

impl HttpRequest {
	pub fn get(url: impl Into<String>) -> Self {
		Self {
			method: HttpMethod::Get,
			url: url.into(),
			headers: Vec::new(),
			query: Vec::new(),
			body: None,
			timeout: None,
		}
	}

	pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
		Self {
			method: HttpMethod::Post,
			body: Some(body),
			..Self::get(url)
		}
	}

	pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.push((name.to_string(), value.into()));
		self
	}

	pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
		self.query.push((name.to_string(), value.into()));
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}
}

/// A courier response. Non-2xx statuses are returned, not raised, so adapters can inspect the body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
	pub status: u16,
	pub body: serde_json::Value,
}

impl HttpResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Pluggable transport used by every HTTP-backed adapter.
#[async_trait]
pub trait HttpTransport: Send + Sync {
	/// Send a request. Connection failures and timeouts surface as `CourierError::Unavailable`.
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CourierError>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
	/// The underlying HTTP client, shared across adapters.
	http_client: Client,
	default_timeout: Duration,
}

impl ReqwestTransport {
	/// Create a new transport.
	///
	/// # Arguments
	/// * `default_timeout` - Applied to every call that does not set its own timeout.
	///
	/// # Returns
	/// The transport, or `CourierError::Config` when the client cannot be built.
	pub fn new(default_timeout: Duration) -> Result<Self, CourierError> {
		let http_client = Client::builder()
			.timeout(default_timeout)
			.build()
			.map_err(|e| CourierError::Config(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			http_client,
			default_timeout,
		})
	}
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CourierError> {
		debug!("Courier request {:?} {}", request.method, request.url);

		let mut builder = match request.method {
			HttpMethod::Get => self.http_client.get(&request.url),
			HttpMethod::Post => self.http_client.post(&request.url),
		};
		builder = builder
			.timeout(request.timeout.unwrap_or(self.default_timeout))
			.header("Accept", "application/json");
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if !request.query.is_empty() {
			builder = builder.query(&request.query);
		}
		if let Some(body) = &request.body {
			builder = builder.json(body);
		}

		let response = builder.send().await.map_err(|e| {
			if e.is_timeout() {
				CourierError::Unavailable(format!("Courier request timed out: {}", request.url))
			} else {
				CourierError::Unavailable(format!("Courier request failed: {}", e))
			}
		})?;

		let status = response.status().as_u16();
		let text = response
			.text()
			.await
			.map_err(|e| CourierError::Unavailable(format!("Failed to read courier response: {}", e)))?;

		let body = if text.trim().is_empty() {
			serde_json::Value::Null
		} else {
			serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
		};

		debug!("Courier response {} from {}", status, request.url);
		Ok(HttpResponse { status, body })
	}
}
