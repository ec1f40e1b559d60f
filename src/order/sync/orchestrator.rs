//! Courier sync orchestrator, the façade the rest of the application talks to.
//!
//! This module defines the `SyncOrchestrator`, which takes an order from "ready to ship" to "on a
//! courier's books". For each order it:
//! - Loads the order and rejects it if it is already synced or missing required fields
//! - Resolves the courier from the free-text partner name and the delivery type from the order
//! - Delegates the push to the matching `ProviderAdapter`
//! - Writes the courier's identifiers back and reads the order again to verify them
//!
//! Provider and persistence failures are recorded on the order before they propagate. Work on one
//! order is serialized through a keyed lock so two concurrent requests cannot book the same order
//! twice.

use crate::courier::{
    AdapterRegistry, CancelResult, Capability, CanonicalStatus, CourierError, PickupRequest,
    PickupResult, ProviderAdapter, ProviderStatus, RateQuery, ShippingRate, SyncResult,
};
use crate::order::sync::{
    delivery_type,
    events::{LogisticsEvent, NotificationDispatcher},
    failure_recorder::{FailureRecorder, recorded_error},
    progress_tracker::BulkSyncTracker,
    provider_resolver::resolve_provider_code,
};
use crate::order::{
    DeliveryType, FulfillmentType, LogisticsError, Order, OrderStatus, OrderStore, OrderUpdate,
    ValidationError,
};
use crate::utils::KeyedLocks;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default pause between successful pushes in a bulk run.
pub const DEFAULT_BULK_DELAY: Duration = Duration::from_millis(300);

/// Attempts at writing and verifying the synced order before giving up.
const PERSIST_ATTEMPTS: usize = 2;

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause after each successful push in a bulk run, to stay under courier rate limits
    pub bulk_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bulk_delay: DEFAULT_BULK_DELAY,
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Caller-supplied delivery type (`"D2D"` or `"D2B"`). Only used when the order does not
    /// record one.
    pub delivery_type: Option<String>,
}

impl SyncOptions {
    pub fn with_delivery_type(delivery_type: impl Into<String>) -> Self {
        Self {
            delivery_type: Some(delivery_type.into()),
        }
    }
}

/// A successful push
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub order_id: Uuid,
    pub provider: String,
    pub tracking_id: String,
    pub waybill: String,
    pub delivery_type: DeliveryType,
    pub message: String,
    /// Order as read back from the store after the update
    pub order: Order,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    /// The id as supplied by the caller, which may not parse
    pub order_id: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<SyncOutcome>,
    pub failed: Vec<BulkFailure>,
}

/// Logistics state of an order as stored
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub order_id: Uuid,
    pub is_synced: bool,
    pub provider: Option<String>,
    pub external_order_id: Option<String>,
    pub waybill: Option<String>,
    pub logistics_status: Option<String>,
    pub delivery_type: Option<String>,
    pub status: OrderStatus,
    pub synced_at: Option<DateTime<Utc>>,
    /// Message of the last recorded sync failure, if the last attempt failed
    pub last_error: Option<String>,
}

/// Order status a courier status would move `current` to, or `None` when it would not move the order
/// forward.
pub fn forward_status(current: OrderStatus, courier_status: CanonicalStatus) -> Option<OrderStatus> {
    OrderStatus::from_canonical(courier_status).filter(|target| target.is_forward_from(current))
}

/// Parse a caller-supplied order id.
pub fn parse_order_id(raw: &str) -> Result<Uuid, LogisticsError> {
    Uuid::parse_str(raw.trim()).map_err(|_| LogisticsError::InvalidOrderId(raw.to_string()))
}

/// Checks that must pass before a courier is contacted. Failures here are never recorded.
fn validate_ready(order: &Order) -> Result<(), LogisticsError> {
    if order.is_synced() {
        return Err(LogisticsError::AlreadySynced {
            order_id: order.id,
            external_order_id: order.external_order_id.clone().unwrap_or_default(),
        });
    }
    if order.fulfillment_type != FulfillmentType::External {
        return Err(ValidationError::InvalidFulfillmentType.into());
    }

    let blank = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or("").is_empty();
    if blank(&order.courier_partner) {
        return Err(ValidationError::MissingCourierPartner.into());
    }
    if blank(&order.customer_name) {
        return Err(ValidationError::MissingCustomerName.into());
    }
    if blank(&order.phone) {
        return Err(ValidationError::MissingCustomerPhone.into());
    }
    if blank(&order.address) {
        return Err(ValidationError::MissingCustomerAddress.into());
    }
    Ok(())
}

/// Main logistics façade
pub struct SyncOrchestrator {
    store: Arc<dyn OrderStore>,
    registry: Arc<AdapterRegistry>,
    notifier: Arc<NotificationDispatcher>,
    recorder: FailureRecorder,
    order_locks: Arc<KeyedLocks<Uuid>>,
    config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        registry: Arc<AdapterRegistry>,
        notifier: Arc<NotificationDispatcher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            recorder: FailureRecorder::new(store.clone()),
            store,
            registry,
            notifier,
            order_locks: Arc::new(KeyedLocks::new()),
            config,
        }
    }

    /// Per-order locks serializing every change this orchestrator makes to an order. Share them
    /// with the webhook intake so courier callbacks and pulled statuses never interleave.
    pub fn order_locks(&self) -> Arc<KeyedLocks<Uuid>> {
        self.order_locks.clone()
    }

    /// Push one order to its courier.
    ///
    /// Fails fast with `AlreadySynced` when the order already carries an external id, so a courier
    /// is never booked twice for the same order.
    pub async fn sync_order(
        &self,
        order_id: &str,
        options: &SyncOptions,
    ) -> Result<SyncOutcome, LogisticsError> {
        let order_id = parse_order_id(order_id)?;
        let _guard = self.order_locks.lock(&order_id).await;

        let order = self.load(order_id).await?;
        validate_ready(&order)?;

        match self.push_and_persist(&order, options).await {
            Ok(outcome) => {
                self.notifier
                    .dispatch(&LogisticsEvent::OrderSynced {
                        order_id,
                        provider: outcome.provider.clone(),
                        external_order_id: outcome.tracking_id.clone(),
                        delivery_type: outcome.delivery_type,
                    })
                    .await;
                Ok(outcome)
            }
            Err(e) => {
                if e.is_recordable() {
                    self.recorder.record(order_id, &e).await;
                    self.notifier
                        .dispatch(&LogisticsEvent::SyncFailed {
                            order_id,
                            code: e.code(),
                            message: e.to_string(),
                        })
                        .await;
                }
                Err(e)
            }
        }
    }

    /// Push several orders one after another.
    ///
    /// A failing order never aborts the batch. After every successful push the run pauses for
    /// `bulk_delay` before the next order.
    pub async fn sync_orders_bulk(&self, order_ids: &[String], options: &SyncOptions) -> BulkOutcome {
        let mut tracker = BulkSyncTracker::new(order_ids.len());
        let mut outcome = BulkOutcome::default();

        info!("Starting bulk courier sync of {} orders", order_ids.len());
        for order_id in order_ids {
            match self.sync_order(order_id, options).await {
                Ok(synced) => {
                    tracker.record_success();
                    outcome.succeeded.push(synced);
                    if tracker.remaining() > 0 && !self.config.bulk_delay.is_zero() {
                        tokio::time::sleep(self.config.bulk_delay).await;
                    }
                }
                Err(e) => {
                    warn!("Bulk sync: order {} failed: {}", order_id, e);
                    tracker.record_failure(e.code());
                    outcome.failed.push(BulkFailure {
                        order_id: order_id.clone(),
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
            tracker.log_progress(false);
        }

        info!("{}", tracker.get_stats().summary());
        outcome
    }

    /// Logistics fields of an order as stored, with the last recorded failure.
    pub async fn get_sync_status(&self, order_id: &str) -> Result<StatusSnapshot, LogisticsError> {
        let order = self.load(parse_order_id(order_id)?).await?;

        Ok(StatusSnapshot {
            order_id: order.id,
            is_synced: order.is_synced(),
            last_error: recorded_error(order.logistics_response.as_ref()),
            provider: order.logistics_provider,
            external_order_id: order.external_order_id,
            waybill: order.waybill,
            logistics_status: order.logistics_status,
            delivery_type: order.delivery_type,
            status: order.status,
            synced_at: order.logistics_synced_at,
        })
    }

    /// Pull the latest status from the order's courier.
    ///
    /// A pulled status that moves the order forward is applied the same way a webhook would apply
    /// it.
    pub async fn get_tracking_info(&self, order_id: &str) -> Result<ProviderStatus, LogisticsError> {
        let order_id = parse_order_id(order_id)?;
        let _guard = self.order_locks.lock(&order_id).await;

        let order = self.load(order_id).await?;
        let (adapter, tracking_id) = self.synced_adapter(&order).await?;
        let status = adapter.pull_status(&tracking_id).await?;

        if let Some(target) = forward_status(order.status, status.canonical_status) {
            self.store
                .update(
                    order_id,
                    &OrderUpdate {
                        logistics_status: Some(status.raw_status.clone()),
                        status: Some(target),
                        ..Default::default()
                    },
                )
                .await?;
            self.notifier
                .dispatch(&LogisticsEvent::StatusChanged {
                    order_id,
                    tracking_id: tracking_id.clone(),
                    from: order.status,
                    to: target,
                    raw_status: status.raw_status.clone(),
                })
                .await;
        } else {
            debug!(
                "Pulled status {:?} for {} does not advance order {}",
                status.raw_status, tracking_id, order_id
            );
        }

        Ok(status)
    }

    /// Cancel the order's shipment with its courier.
    ///
    /// Couriers without a cancel API answer `Unsupported` and the order is left untouched.
    pub async fn cancel_shipment(
        &self,
        order_id: &str,
        reason: &str,
    ) -> Result<Capability<CancelResult>, LogisticsError> {
        let order_id = parse_order_id(order_id)?;
        let _guard = self.order_locks.lock(&order_id).await;

        let order = self.load(order_id).await?;
        let (adapter, tracking_id) = self.synced_adapter(&order).await?;

        let result = adapter.cancel_shipment(&tracking_id, reason).await?;
        if let Capability::Supported(cancel) = &result {
            self.store
                .update(
                    order_id,
                    &OrderUpdate {
                        logistics_status: Some("Cancelled".to_string()),
                        status: Some(OrderStatus::Cancelled),
                        ..Default::default()
                    },
                )
                .await?;
            info!("Cancelled shipment {} for order {}: {}", tracking_id, order_id, cancel.message);
            self.notifier
                .dispatch(&LogisticsEvent::StatusChanged {
                    order_id,
                    tracking_id,
                    from: order.status,
                    to: OrderStatus::Cancelled,
                    raw_status: "Cancelled".to_string(),
                })
                .await;
        }

        Ok(result)
    }

    /// Rate lookup against a provider.
    pub async fn shipping_rates(
        &self,
        provider_code: &str,
        query: &RateQuery,
    ) -> Result<Capability<ShippingRate>, LogisticsError> {
        let adapter = self.registry.get(provider_code).await?;
        Ok(adapter.shipping_rates(query).await?)
    }

    /// Ask a provider to collect parcels from the vendor.
    pub async fn request_pickup(
        &self,
        provider_code: &str,
        request: &PickupRequest,
    ) -> Result<Capability<PickupResult>, LogisticsError> {
        let adapter = self.registry.get(provider_code).await?;
        Ok(adapter.request_pickup(request).await?)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, LogisticsError> {
        self.store
            .get(order_id)
            .await?
            .ok_or(LogisticsError::OrderNotFound(order_id))
    }

    /// Adapter and tracking id for an order that has already been pushed.
    async fn synced_adapter(
        &self,
        order: &Order,
    ) -> Result<(Arc<dyn ProviderAdapter>, String), LogisticsError> {
        let tracking_id = match (&order.external_order_id, order.is_logistics_synced) {
            (Some(id), true) => id.clone(),
            _ => return Err(LogisticsError::NotSynced(order.id)),
        };
        let code = match &order.logistics_provider {
            Some(code) => code.clone(),
            None => Self::provider_code(order)?.to_string(),
        };
        Ok((self.registry.get(&code).await?, tracking_id))
    }

    fn provider_code(order: &Order) -> Result<&'static str, LogisticsError> {
        let partner = order.courier_partner.as_deref().unwrap_or("");
        resolve_provider_code(partner)
            .ok_or_else(|| CourierError::UnknownProvider(partner.trim().to_string()).into())
    }

    /// Steps after validation: resolve, push, persist. Every error from here on is recordable
    /// unless it is a field validation error raised by the adapter.
    async fn push_and_persist(
        &self,
        order: &Order,
        options: &SyncOptions,
    ) -> Result<SyncOutcome, LogisticsError> {
        let code = Self::provider_code(order)?;
        let delivery_type = delivery_type::resolve(
            order.delivery_type.as_deref(),
            options.delivery_type.as_deref(),
        );
        let adapter = self.registry.get(code).await?;

        info!(
            order_id = %order.id,
            provider = code,
            "Pushing order to {} as {}",
            adapter.display_name(),
            delivery_type
        );
        let result = adapter.push_order(order, delivery_type).await?;

        let stored = self.persist_verified(order.id, &result).await?;
        info!(
            order_id = %order.id,
            provider = code,
            tracking_id = result.tracking_id.as_str(),
            "Order handed over to courier"
        );

        Ok(SyncOutcome {
            order_id: order.id,
            provider: result.provider,
            tracking_id: result.tracking_id,
            waybill: result.waybill,
            delivery_type: result.delivery_type,
            message: result.message,
            order: stored,
        })
    }

    /// Write the courier's identifiers and read the order back, retrying once.
    async fn persist_verified(
        &self,
        order_id: Uuid,
        result: &SyncResult,
    ) -> Result<Order, LogisticsError> {
        let update = OrderUpdate {
            is_logistics_synced: Some(true),
            external_order_id: Some(result.tracking_id.clone()),
            waybill: Some(result.waybill.clone()),
            logistics_provider: Some(result.provider.clone()),
            logistics_status: Some(result.message.clone()),
            logistics_synced_at: Some(Utc::now()),
            logistics_response: Some(json!({
                "success": true,
                "message": result.message,
                "response": result.raw_response,
            })),
            delivery_type: Some(result.delivery_type.as_str().to_string()),
            status: Some(OrderStatus::HandoverToCourier),
        };

        for attempt in 1..=PERSIST_ATTEMPTS {
            if let Err(e) = self.store.update(order_id, &update).await {
                warn!("Attempt {} to update order {} failed: {}", attempt, order_id, e);
                continue;
            }

            match self.store.get(order_id).await {
                Ok(Some(stored))
                    if stored.is_logistics_synced
                        && stored.external_order_id.as_deref() == Some(result.tracking_id.as_str()) =>
                {
                    return Ok(stored);
                }
                Ok(_) => warn!(
                    "Attempt {} to verify order {}: stored record does not show {}",
                    attempt, order_id, result.tracking_id
                ),
                Err(e) => warn!("Attempt {} to read back order {} failed: {}", attempt, order_id, e),
            }
        }

        Err(LogisticsError::PersistenceVerificationFailed {
            order_id,
            external_order_id: result.tracking_id.clone(),
        })
    }
}
