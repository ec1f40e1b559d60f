//! Notification events for logistics state changes.
//!
//! The orchestrator and webhook intake emit a `LogisticsEvent` whenever an order is pushed to a
//! courier, a push fails, or a courier moves an order forward. Registered notifiers (ticketing, SMS,
//! logging) receive every event. Delivery is fire-and-forget: a failing notifier is logged and never
//! affects the operation that emitted the event.

use crate::order::{DeliveryType, OrderStatus};

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events emitted by the logistics layer
#[derive(Debug, Clone, PartialEq)]
pub enum LogisticsEvent {
    /// A courier accepted the order and the order record was updated
    OrderSynced {
        order_id: Uuid,
        provider: String,
        external_order_id: String,
        delivery_type: DeliveryType,
    },
    /// A push attempt failed with a recordable error
    SyncFailed {
        order_id: Uuid,
        code: &'static str,
        message: String,
    },
    /// A courier status moved the order forward
    StatusChanged {
        order_id: Uuid,
        tracking_id: String,
        from: OrderStatus,
        to: OrderStatus,
        raw_status: String,
    },
}

impl LogisticsEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            LogisticsEvent::OrderSynced { order_id, .. }
            | LogisticsEvent::SyncFailed { order_id, .. }
            | LogisticsEvent::StatusChanged { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Trait for receiving logistics events.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &LogisticsEvent) -> Result<(), NotifyError>;

    /// Get the name of this notifier for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Fans events out to every registered notifier.
#[derive(Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// Create a new, empty dispatcher.
    pub fn new() -> Self {
        Self {
            notifiers: Vec::new(),
        }
    }

    /// Register a new notifier.
    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver an event to all notifiers concurrently.
    ///
    /// Errors from notifiers are logged, but do not stop other notifiers from running.
    pub async fn dispatch(&self, event: &LogisticsEvent) {
        let results = join_all(self.notifiers.iter().map(|n| n.notify(event))).await;
        for (notifier, result) in self.notifiers.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    "Notifier {} failed for order {}: {}",
                    notifier.name(),
                    event.order_id(),
                    e
                );
            }
        }
    }
}

/// Writes every event to the log.
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &LogisticsEvent) -> Result<(), NotifyError> {
        match event {
            LogisticsEvent::OrderSynced {
                order_id,
                provider,
                external_order_id,
                delivery_type,
            } => info!(
                %order_id,
                provider = provider.as_str(),
                external_order_id = external_order_id.as_str(),
                "Order handed over to courier as {}",
                delivery_type
            ),
            LogisticsEvent::SyncFailed {
                order_id,
                code,
                message,
            } => warn!(%order_id, code = *code, "Courier sync failed: {}", message),
            LogisticsEvent::StatusChanged {
                order_id,
                tracking_id,
                from,
                to,
                raw_status,
            } => info!(
                %order_id,
                tracking_id = tracking_id.as_str(),
                "Order moved from {} to {} (courier status {:?})",
                from,
                to,
                raw_status
            ),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recording(Arc<Mutex<Vec<Uuid>>>);

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn notify(&self, event: &LogisticsEvent) -> Result<(), NotifyError> {
            self.0.lock().push(event.order_id());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _event: &LogisticsEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("sms gateway down".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.register(Box::new(Failing));
        dispatcher.register(Box::new(Recording(seen.clone())));
        dispatcher.register(Box::new(TracingNotifier));

        let order_id = Uuid::new_v4();
        dispatcher
            .dispatch(&LogisticsEvent::SyncFailed {
                order_id,
                code: "PROVIDER_UNAVAILABLE",
                message: "timeout".to_string(),
            })
            .await;

        assert_eq!(*seen.lock(), vec![order_id]);
        assert_eq!(dispatcher.len(), 3);
    }
}
