use courier_sync::courier::{AdapterRegistry, CourierError, ReqwestTransport};
use courier_sync::order::MemoryOrderStore;
use courier_sync::order::sync::{NotificationDispatcher, TracingNotifier};
use courier_sync::utils::KeyedLocks;
use courier_sync::webhook::{MemoryWebhookLog, WebhookIntake, webhook_router};
use courier_sync::Settings;

use backoff::{ExponentialBackoff, future::retry};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Give up retrying an unavailable courier after this long.
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(120);

const USAGE: &str = "usage: courier-sync <provider> <tracking-id>\n       courier-sync serve [addr]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	if let Err(e) = dotenvy::dotenv() {
		// A missing .env is normal; everything can come from the environment.
		if !e.not_found() {
			warn!("Failed to load .env: {}", e);
		}
	}

	let args: Vec<String> = std::env::args().skip(1).collect();
	let result = match args.as_slice() {
		[command] if command == "serve" => serve("0.0.0.0:8080").await,
		[command, addr] if command == "serve" => serve(addr).await,
		[provider, tracking_id] => track(provider, tracking_id).await,
		_ => {
			eprintln!("{}", USAGE);
			return ExitCode::from(2);
		}
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

fn build_registry(
	settings: Arc<Settings>,
	store: Arc<MemoryOrderStore>,
) -> Result<Arc<AdapterRegistry>, BoxError> {
	let transport = Arc::new(ReqwestTransport::new(settings.http_timeout)?);
	let registry = AdapterRegistry::new(settings, transport, store);
	registry.register_builtin_providers();
	Ok(Arc::new(registry))
}

/// Pull and log the status of one shipment, retrying while the courier is unavailable.
async fn track(provider: &str, tracking_id: &str) -> Result<(), BoxError> {
	let settings = Arc::new(Settings::from_env()?);
	info!("Configured couriers: {}", settings.provider_codes().join(", "));

	let registry = build_registry(settings, Arc::new(MemoryOrderStore::new()))?;
	let adapter = registry.get(provider).await?;

	let backoff = ExponentialBackoff {
		max_elapsed_time: Some(MAX_RETRY_ELAPSED),
		..Default::default()
	};
	let status = retry(backoff, || async {
		adapter.pull_status(tracking_id).await.map_err(|e| match e {
			CourierError::Unavailable(_) => {
				warn!("{} unavailable, retrying: {}", adapter.display_name(), e);
				backoff::Error::transient(e)
			}
			other => backoff::Error::permanent(other),
		})
	})
	.await?;

	info!(
		"{} {}: {} ({}){}",
		adapter.display_name(),
		status.tracking_id,
		status.canonical_status,
		status.raw_status,
		status
			.location
			.as_deref()
			.map(|l| format!(" at {}", l))
			.unwrap_or_default()
	);
	Ok(())
}

/// Serve the webhook endpoints.
async fn serve(addr: &str) -> Result<(), BoxError> {
	let settings = Arc::new(Settings::from_env()?);
	let store = Arc::new(MemoryOrderStore::new());
	let registry = build_registry(settings, store.clone())?;

	let mut dispatcher = NotificationDispatcher::new();
	dispatcher.register(Box::new(TracingNotifier));

	let intake = Arc::new(WebhookIntake::new(
		registry,
		store,
		Arc::new(MemoryWebhookLog::new()),
		Arc::new(dispatcher),
		Arc::new(KeyedLocks::new()),
	));

	let listener = tokio::net::TcpListener::bind(addr).await?;
	info!("Listening for courier webhooks on {}", addr);
	axum::serve(listener, webhook_router(intake)).await?;
	Ok(())
}
