//! Provider code → adapter lookup with a lazily filled configuration cache.

use super::adapter::ProviderAdapter;
use super::dummy::{DUMMY_CODE, DummyAdapter};
use super::gaaubesi::{GAAUBESI_CODE, GaauBesiAdapter};
use super::ncm::{NCM_CODE, NcmAdapter};
use super::transport::HttpTransport;
use super::types::{CourierError, ProviderConfig};
use crate::order::OrderStore;
use crate::order::sync::resolve_provider_code;
use crate::utils::sanitize_tracking_id;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Builds an adapter for one provider from its configuration.
pub type AdapterConstructor =
	Arc<dyn Fn(ProviderConfig, Arc<dyn HttpTransport>) -> Arc<dyn ProviderAdapter> + Send + Sync>;

/// Where provider configuration comes from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
	/// Configuration for `code`, or `None` when the provider is not configured.
	async fn fetch(&self, code: &str) -> Result<Option<ProviderConfig>, CourierError>;
}

/// Registry of courier adapters.
///
/// One instance is built at startup and shared by the orchestrator and webhook intake. Provider
/// configuration is fetched on first use and cached for the life of the registry.
pub struct AdapterRegistry {
	constructors: RwLock<HashMap<String, AdapterConstructor>>,
	configs: Mutex<HashMap<String, ProviderConfig>>,
	config_source: Arc<dyn ConfigSource>,
	transport: Arc<dyn HttpTransport>,
	order_store: Arc<dyn OrderStore>,
}

impl AdapterRegistry {
	pub fn new(
		config_source: Arc<dyn ConfigSource>,
		transport: Arc<dyn HttpTransport>,
		order_store: Arc<dyn OrderStore>,
	) -> Self {
		Self {
			constructors: RwLock::new(HashMap::new()),
			configs: Mutex::new(HashMap::new()),
			config_source,
			transport,
			order_store,
		}
	}

	/// Register a constructor under `code`. Codes are case-insensitive; registering again replaces
	/// the previous constructor.
	pub fn register(&self, code: &str, constructor: AdapterConstructor) {
		let code = code.trim().to_ascii_lowercase();
		debug!("Registering courier adapter {}", code);
		self.constructors.write().insert(code, constructor);
	}

	/// Register the NCM, Gaau Besi and dummy adapters.
	pub fn register_builtin_providers(&self) {
		self.register(
			NCM_CODE,
			Arc::new(|config, transport| Arc::new(NcmAdapter::new(config, transport)) as Arc<dyn ProviderAdapter>),
		);
		self.register(
			GAAUBESI_CODE,
			Arc::new(|config, transport| {
				Arc::new(GaauBesiAdapter::new(config, transport)) as Arc<dyn ProviderAdapter>
			}),
		);
		self.register(
			DUMMY_CODE,
			Arc::new(|config, _transport: Arc<dyn HttpTransport>| {
				Arc::new(DummyAdapter::new(config)) as Arc<dyn ProviderAdapter>
			}),
		);
	}

	/// Registered codes, sorted.
	pub fn registered_codes(&self) -> Vec<String> {
		let mut codes: Vec<String> = self.constructors.read().keys().cloned().collect();
		codes.sort();
		codes
	}

	/// Build an adapter for `code`.
	///
	/// Fails with `UnknownProvider` when nothing is registered under the code and with `Config` when
	/// the provider is registered but not configured.
	pub async fn get(&self, code: &str) -> Result<Arc<dyn ProviderAdapter>, CourierError> {
		let code = code.trim().to_ascii_lowercase();
		let constructor = self
			.constructors
			.read()
			.get(&code)
			.cloned()
			.ok_or_else(|| CourierError::UnknownProvider(code.clone()))?;

		let config = self.config_for(&code).await?;
		Ok(constructor(config, self.transport.clone()))
	}

	/// Adapter for the courier that holds `tracking_id`, found through the order that references
	/// it. Returns `None` rather than failing when any step of the lookup comes up empty.
	pub async fn get_by_tracking_id(&self, tracking_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
		let sanitized = sanitize_tracking_id(tracking_id)?;

		let order = match self.order_store.find_by_tracking_id(&sanitized).await {
			Ok(Some(order)) => order,
			Ok(None) => {
				debug!("No order references tracking id {}", sanitized);
				return None;
			}
			Err(e) => {
				warn!("Order lookup for tracking id {} failed: {}", sanitized, e);
				return None;
			}
		};

		let code = order
			.logistics_provider
			.clone()
			.or_else(|| {
				order
					.courier_partner
					.as_deref()
					.and_then(resolve_provider_code)
					.map(str::to_string)
			})?;

		match self.get(&code).await {
			Ok(adapter) => Some(adapter),
			Err(e) => {
				warn!("Could not build adapter {} for tracking id {}: {}", code, sanitized, e);
				None
			}
		}
	}

	/// Forget all cached provider configuration.
	pub async fn clear_cache(&self) {
		self.configs.lock().await.clear();
		info!("Courier configuration cache cleared");
	}

	async fn config_for(&self, code: &str) -> Result<ProviderConfig, CourierError> {
		// Held across the fetch so concurrent first uses fetch once.
		let mut configs = self.configs.lock().await;
		if let Some(config) = configs.get(code) {
			return Ok(config.clone());
		}

		let config = self
			.config_source
			.fetch(code)
			.await?
			.ok_or_else(|| CourierError::Config(format!("No configuration for provider {}", code)))?;
		debug!("Cached configuration for provider {}", code);
		configs.insert(code.to_string(), config.clone());
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::courier::{HttpRequest, HttpResponse, StatusMap};
	use crate::order::{MemoryOrderStore, Order};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use uuid::Uuid;

	struct CountingSource {
		fetches: AtomicUsize,
	}

	#[async_trait]
	impl ConfigSource for CountingSource {
		async fn fetch(&self, code: &str) -> Result<Option<ProviderConfig>, CourierError> {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			if code == "gaaubesi" {
				return Ok(None);
			}
			Ok(Some(ProviderConfig {
				code: code.to_string(),
				display_name: code.to_uppercase(),
				base_url: "http://courier.test".to_string(),
				api_token: None,
				source_branch: None,
				webhook_secret: None,
				status_map: StatusMap::builtin(code),
			}))
		}
	}

	struct NoNetwork;

	#[async_trait]
	impl HttpTransport for NoNetwork {
		async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, CourierError> {
			Err(CourierError::Unavailable("no network in tests".to_string()))
		}
	}

	fn registry(store: Arc<MemoryOrderStore>) -> (AdapterRegistry, Arc<CountingSource>) {
		let source = Arc::new(CountingSource {
			fetches: AtomicUsize::new(0),
		});
		let registry = AdapterRegistry::new(source.clone(), Arc::new(NoNetwork), store);
		registry.register_builtin_providers();
		(registry, source)
	}

	#[tokio::test]
	async fn test_config_is_fetched_once_and_cache_can_be_cleared() {
		let (registry, source) = registry(Arc::new(MemoryOrderStore::new()));

		assert_eq!(registry.get("NCM").await.unwrap().code(), "ncm");
		assert_eq!(registry.get("ncm").await.unwrap().code(), "ncm");
		assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

		registry.clear_cache().await;
		registry.get("ncm").await.unwrap();
		assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_unknown_and_unconfigured_providers() {
		let (registry, _) = registry(Arc::new(MemoryOrderStore::new()));

		assert!(matches!(
			registry.get("pathao").await,
			Err(CourierError::UnknownProvider(code)) if code == "pathao"
		));
		assert!(matches!(registry.get("gaaubesi").await, Err(CourierError::Config(_))));
		assert_eq!(registry.registered_codes(), vec!["dummy", "gaaubesi", "ncm"]);
	}

	#[tokio::test]
	async fn test_lookup_by_tracking_id_uses_order_courier() {
		let store = Arc::new(MemoryOrderStore::new());
		let mut order = Order::new(Uuid::new_v4());
		order.courier_partner = Some("Nepal Can Move".to_string());
		order.external_order_id = Some("NCM555".to_string());
		order.is_logistics_synced = true;
		store.insert(order);

		let (registry, _) = registry(store);
		let adapter = registry.get_by_tracking_id("ncm555").await.unwrap();
		assert_eq!(adapter.code(), "ncm");
		assert!(registry.get_by_tracking_id("NOPE-1").await.is_none());
		assert!(registry.get_by_tracking_id("bad id; drop").await.is_none());
	}
}
