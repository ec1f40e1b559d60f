//! Environment-sourced configuration
//!
//! Loaded once at startup. Per-provider settings live under `COURIER_<CODE>_*`:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `COURIER_<CODE>_BASE_URL` | API root. A provider without one is not configured (dummy excepted). |
//! | `COURIER_<CODE>_TOKEN` | API token |
//! | `COURIER_<CODE>_SOURCE_BRANCH` | Branch the vendor ships from |
//! | `COURIER_<CODE>_WEBHOOK_SECRET` | Shared secret for callbacks |
//! | `COURIER_<CODE>_DISPLAY_NAME` | Name shown to staff |
//! | `COURIER_<CODE>_STATUS_MAP` | JSON object of extra raw → canonical status entries |
//!
//! Globals: `COURIER_HTTP_TIMEOUT_SECS` (default 30) and `COURIER_BULK_DELAY_MS` (default 300).

use crate::courier::{
	CanonicalStatus, ConfigSource, CourierError, DEFAULT_COURIER_TIMEOUT, DUMMY_BASE_URL, DUMMY_CODE,
	GAAUBESI_CODE, NCM_CODE, ProviderConfig, StatusMap,
};
use crate::order::sync::DEFAULT_BULK_DELAY;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Provider codes read from the environment.
pub const KNOWN_PROVIDERS: [&str; 3] = [NCM_CODE, GAAUBESI_CODE, DUMMY_CODE];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("{name} is not a valid number: {value:?}")]
	InvalidNumber { name: String, value: String },

	#[error("{name} is not a JSON object of status names: {reason}")]
	InvalidStatusMap { name: String, reason: String },
}

/// Settings for one provider as read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
	pub code: String,
	pub display_name: String,
	pub base_url: String,
	pub api_token: Option<String>,
	pub source_branch: Option<String>,
	pub webhook_secret: Option<String>,
	/// Built-in table for the code with configured extras merged over it.
	pub status_map: StatusMap,
}

impl ProviderSettings {
	pub fn to_provider_config(&self) -> ProviderConfig {
		ProviderConfig {
			code: self.code.clone(),
			display_name: self.display_name.clone(),
			base_url: self.base_url.clone(),
			api_token: self.api_token.clone(),
			source_branch: self.source_branch.clone(),
			webhook_secret: self.webhook_secret.clone(),
			status_map: self.status_map.clone(),
		}
	}
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Settings {
	/// Configured providers by code.
	pub providers: HashMap<String, ProviderSettings>,
	/// Default timeout for courier calls.
	pub http_timeout: Duration,
	/// Pause between successful pushes in a bulk run.
	pub bulk_delay: Duration,
}

impl Settings {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Load configuration through `lookup`, which returns the value of a variable if set.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

		let http_timeout = match var("COURIER_HTTP_TIMEOUT_SECS") {
			Some(value) => Duration::from_secs(parse_number("COURIER_HTTP_TIMEOUT_SECS", &value)?),
			None => DEFAULT_COURIER_TIMEOUT,
		};
		let bulk_delay = match var("COURIER_BULK_DELAY_MS") {
			Some(value) => Duration::from_millis(parse_number("COURIER_BULK_DELAY_MS", &value)?),
			None => DEFAULT_BULK_DELAY,
		};

		let mut providers = HashMap::new();
		for code in KNOWN_PROVIDERS {
			let prefix = format!("COURIER_{}", code.to_ascii_uppercase());
			let key = |suffix: &str| format!("{}_{}", prefix, suffix);

			let base_url = match (var(&key("BASE_URL")), code) {
				(Some(url), _) => url,
				(None, DUMMY_CODE) => DUMMY_BASE_URL.to_string(),
				(None, _) => continue,
			};

			let mut status_map = StatusMap::builtin(code);
			if let Some(raw) = var(&key("STATUS_MAP")) {
				status_map.merge(&parse_status_map(&key("STATUS_MAP"), &raw)?);
			}

			providers.insert(
				code.to_string(),
				ProviderSettings {
					code: code.to_string(),
					display_name: var(&key("DISPLAY_NAME")).unwrap_or_else(|| default_display_name(code)),
					base_url,
					api_token: var(&key("TOKEN")),
					source_branch: var(&key("SOURCE_BRANCH")),
					webhook_secret: var(&key("WEBHOOK_SECRET")),
					status_map,
				},
			);
		}

		Ok(Self {
			providers,
			http_timeout,
			bulk_delay,
		})
	}

	/// Configured provider codes, sorted.
	pub fn provider_codes(&self) -> Vec<&str> {
		let mut codes: Vec<&str> = self.providers.keys().map(String::as_str).collect();
		codes.sort();
		codes
	}
}

#[async_trait]
impl ConfigSource for Settings {
	async fn fetch(&self, code: &str) -> Result<Option<ProviderConfig>, CourierError> {
		Ok(self
			.providers
			.get(&code.to_ascii_lowercase())
			.map(ProviderSettings::to_provider_config))
	}
}

fn default_display_name(code: &str) -> String {
	match code {
		NCM_CODE => "Nepal Can Move".to_string(),
		GAAUBESI_CODE => "Gaau Besi".to_string(),
		DUMMY_CODE => "Test Courier".to_string(),
		other => other.to_string(),
	}
}

fn parse_number(name: &str, value: &str) -> Result<u64, ConfigError> {
	value.parse().map_err(|_| ConfigError::InvalidNumber {
		name: name.to_string(),
		value: value.to_string(),
	})
}

/// `{"Raw Status": "canonical_name", ...}`
fn parse_status_map(name: &str, raw: &str) -> Result<StatusMap, ConfigError> {
	let invalid = |reason: String| ConfigError::InvalidStatusMap {
		name: name.to_string(),
		reason,
	};

	let entries: HashMap<String, String> =
		serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

	let mut map = StatusMap::new();
	for (raw_status, canonical) in entries {
		let status = CanonicalStatus::parse(&canonical)
			.ok_or_else(|| invalid(format!("unknown status {:?} for {:?}", canonical, raw_status)))?;
		map.insert(&raw_status, status);
	}
	Ok(map)
}
