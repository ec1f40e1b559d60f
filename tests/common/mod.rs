#![allow(dead_code)]

use async_trait::async_trait;
use courier_sync::courier::{
	AdapterRegistry, ConfigSource, CourierError, HttpMethod, HttpRequest, HttpResponse,
	HttpTransport, NcmAdapter, NormalizedEvent, ProviderAdapter, ProviderConfig, ProviderStatus,
	StatusMap, SyncResult,
};
use courier_sync::order::sync::{NotificationDispatcher, SyncConfig, SyncOrchestrator};
use courier_sync::order::{
	DeliveryType, FulfillmentType, MemoryOrderStore, Order, OrderComment, OrderStore, OrderUpdate,
	StoreError,
};
use courier_sync::webhook::{MemoryWebhookLog, WebhookIntake};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub const NCM_SECRET: &str = "ncm-webhook-secret";

/// Transport that answers from a queue of canned responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
	responses: Mutex<VecDeque<Result<HttpResponse, CourierError>>>,
	pub requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn respond(&self, status: u16, body: Value) {
		self.responses
			.lock()
			.push_back(Ok(HttpResponse { status, body }));
	}

	pub fn fail(&self, error: CourierError) {
		self.responses.lock().push_back(Err(error));
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().len()
	}

	pub fn last_request(&self) -> HttpRequest {
		self.requests.lock().last().cloned().expect("no request was sent")
	}

	pub fn posts(&self) -> usize {
		self.requests
			.lock()
			.iter()
			.filter(|r| r.method == HttpMethod::Post)
			.count()
	}
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
	async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CourierError> {
		self.requests.lock().push(request);
		self.responses
			.lock()
			.pop_front()
			.unwrap_or_else(|| Err(CourierError::Unavailable("no scripted response".to_string())))
	}
}

/// Fixed provider configuration, one entry per code.
pub struct StaticConfig(pub HashMap<String, ProviderConfig>);

#[async_trait]
impl ConfigSource for StaticConfig {
	async fn fetch(&self, code: &str) -> Result<Option<ProviderConfig>, CourierError> {
		Ok(self.0.get(code).cloned())
	}
}

pub fn provider_config(code: &str, secret: Option<&str>) -> ProviderConfig {
	ProviderConfig {
		code: code.to_string(),
		display_name: match code {
			"ncm" => "Nepal Can Move".to_string(),
			"gaaubesi" => "Gaau Besi".to_string(),
			other => other.to_string(),
		},
		base_url: format!("https://{}.courier.test/api", code),
		api_token: Some(format!("{}-token", code)),
		source_branch: Some("TINKUNE".to_string()),
		webhook_secret: secret.map(str::to_string),
		status_map: StatusMap::builtin(code),
	}
}

pub fn static_config() -> Arc<StaticConfig> {
	let configs = [
		provider_config("ncm", Some(NCM_SECRET)),
		provider_config("gaaubesi", None),
		provider_config("dummy", None),
	];
	Arc::new(StaticConfig(
		configs.into_iter().map(|c| (c.code.clone(), c)).collect(),
	))
}

/// Adapter that counts pushes and books every order as `MOCK-<n>`.
pub struct CountingAdapter {
	pub pushes: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for CountingAdapter {
	fn code(&self) -> &str {
		"ncm"
	}

	fn display_name(&self) -> &str {
		"Counting Courier"
	}

	async fn push_order(
		&self,
		order: &Order,
		delivery_type: DeliveryType,
	) -> Result<SyncResult, CourierError> {
		let n = self.pushes.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(SyncResult {
			provider: "ncm".to_string(),
			tracking_id: format!("MOCK-{}", n),
			waybill: format!("MOCK-{}", n),
			message: format!("Booked {}", order.id),
			delivery_type,
			raw_response: json!({ "orderid": format!("MOCK-{}", n) }),
		})
	}

	async fn pull_status(&self, tracking_id: &str) -> Result<ProviderStatus, CourierError> {
		Err(CourierError::Unavailable(format!("no status for {}", tracking_id)))
	}

	fn normalize_webhook(&self, _payload: &Value) -> Result<NormalizedEvent, CourierError> {
		Err(CourierError::InvalidPayload("not supported".to_string()))
	}

	fn webhook_signature(
		&self,
		_headers: &BTreeMap<String, String>,
		_payload: &Value,
	) -> Option<String> {
		None
	}

	fn verify_webhook_signature(&self, _signature: Option<&str>, _payload: &[u8]) -> bool {
		true
	}
}

/// Order store whose updates report success but never persist.
pub struct ForgetfulStore {
	pub inner: MemoryOrderStore,
	pub updates: AtomicUsize,
}

#[async_trait]
impl OrderStore for ForgetfulStore {
	async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
		self.inner.get(id).await
	}

	async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, StoreError> {
		self.updates.fetch_add(1, Ordering::SeqCst);
		let mut order = self
			.inner
			.get(id)
			.await?
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		update.apply_to(&mut order);
		Ok(order)
	}

	async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, StoreError> {
		self.inner.find_by_tracking_id(tracking_id).await
	}

	async fn append_comment(&self, comment: OrderComment) -> Result<(), StoreError> {
		self.inner.append_comment(comment).await
	}

	async fn comments_for(&self, order_id: Uuid) -> Result<Vec<OrderComment>, StoreError> {
		self.inner.comments_for(order_id).await
	}

	async fn find_comment_by_event(
		&self,
		order_id: Uuid,
		event_id: &str,
	) -> Result<Option<OrderComment>, StoreError> {
		self.inner.find_comment_by_event(order_id, event_id).await
	}
}

/// How the first write to a `FlakyStore` goes wrong.
#[derive(Clone, Copy, Debug)]
pub enum FirstWrite {
	/// The backend reports an error.
	Errors,
	/// The write reports success but does not persist.
	IsLost,
}

/// Order store whose first update fails and whose later updates succeed.
pub struct FlakyStore {
	pub inner: MemoryOrderStore,
	pub updates: AtomicUsize,
	pub first_write: FirstWrite,
}

impl FlakyStore {
	pub fn new(first_write: FirstWrite) -> Self {
		Self {
			inner: MemoryOrderStore::new(),
			updates: AtomicUsize::new(0),
			first_write,
		}
	}
}

#[async_trait]
impl OrderStore for FlakyStore {
	async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
		self.inner.get(id).await
	}

	async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, StoreError> {
		if self.updates.fetch_add(1, Ordering::SeqCst) > 0 {
			return self.inner.update(id, update).await;
		}
		match self.first_write {
			FirstWrite::Errors => Err(StoreError::Backend("connection reset".to_string())),
			FirstWrite::IsLost => {
				let mut order = self
					.inner
					.get(id)
					.await?
					.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
				update.apply_to(&mut order);
				Ok(order)
			}
		}
	}

	async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, StoreError> {
		self.inner.find_by_tracking_id(tracking_id).await
	}

	async fn append_comment(&self, comment: OrderComment) -> Result<(), StoreError> {
		self.inner.append_comment(comment).await
	}

	async fn comments_for(&self, order_id: Uuid) -> Result<Vec<OrderComment>, StoreError> {
		self.inner.comments_for(order_id).await
	}

	async fn find_comment_by_event(
		&self,
		order_id: Uuid,
		event_id: &str,
	) -> Result<Option<OrderComment>, StoreError> {
		self.inner.find_comment_by_event(order_id, event_id).await
	}
}

/// An externally fulfilled COD order ready to push to NCM.
pub fn ready_order() -> Order {
	let mut order = Order::new(Uuid::new_v4());
	order.customer_name = Some("Sita Sharma".to_string());
	order.phone = Some("+977-98-4512-3456".to_string());
	order.address = Some("Lakeside, Ward 6".to_string());
	order.total_amount = 1250.0;
	order.payable_amount = 1200.0;
	order.payment_method = Some("COD".to_string());
	order.courier_partner = Some("Nepal Can Move".to_string());
	order.destination_branch = Some("POKHARA".to_string());
	order.fulfillment_type = FulfillmentType::External;
	order
}

/// An order already handed over to NCM as `tracking_id`.
pub fn synced_order(tracking_id: &str) -> Order {
	let mut order = ready_order();
	order.is_logistics_synced = true;
	order.external_order_id = Some(tracking_id.to_string());
	order.waybill = Some(tracking_id.to_string());
	order.logistics_provider = Some("ncm".to_string());
	order.status = courier_sync::order::OrderStatus::HandoverToCourier;
	order
}

pub struct Harness {
	pub store: Arc<MemoryOrderStore>,
	pub transport: Arc<ScriptedTransport>,
	pub registry: Arc<AdapterRegistry>,
	pub orchestrator: SyncOrchestrator,
	pub intake: Arc<WebhookIntake>,
	pub log: Arc<MemoryWebhookLog>,
}

/// Real adapters over a scripted transport and an in-memory store.
pub fn harness() -> Harness {
	let store = Arc::new(MemoryOrderStore::new());
	let transport = ScriptedTransport::new();
	let registry = Arc::new(AdapterRegistry::new(
		static_config(),
		transport.clone(),
		store.clone(),
	));
	registry.register_builtin_providers();

	let notifier = Arc::new(NotificationDispatcher::new());
	let orchestrator = SyncOrchestrator::new(
		store.clone(),
		registry.clone(),
		notifier.clone(),
		SyncConfig {
			bulk_delay: Duration::ZERO,
		},
	);
	let log = Arc::new(MemoryWebhookLog::new());
	let intake = Arc::new(WebhookIntake::new(
		registry.clone(),
		store.clone(),
		log.clone(),
		notifier,
		orchestrator.order_locks(),
	));

	Harness {
		store,
		transport,
		registry,
		orchestrator,
		intake,
		log,
	}
}

/// Replace the NCM adapter with a counting one. Returns the push counter.
pub fn use_counting_ncm(registry: &AdapterRegistry) -> Arc<AtomicUsize> {
	let pushes = Arc::new(AtomicUsize::new(0));
	let counter = pushes.clone();
	registry.register(
		"ncm",
		Arc::new(move |_config: ProviderConfig, _transport: Arc<dyn HttpTransport>| {
			Arc::new(CountingAdapter {
				pushes: counter.clone(),
			}) as Arc<dyn ProviderAdapter>
		}),
	);
	pushes
}

/// Build an NCM adapter directly, for payload checks.
pub fn ncm_adapter(transport: Arc<ScriptedTransport>) -> NcmAdapter {
	NcmAdapter::new(provider_config("ncm", Some(NCM_SECRET)), transport)
}
