//! Order store collaborator.

use super::types::{Order, OrderComment, OrderUpdate, StoreError};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// Read and partial-update access to the authoritative order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
	async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

	/// Apply `update` and return the row as stored afterwards.
	async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, StoreError>;

	/// Order whose external id or waybill equals `tracking_id`, ignoring case. Callers sanitize the
	/// id first.
	async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, StoreError>;

	async fn append_comment(&self, comment: OrderComment) -> Result<(), StoreError>;

	async fn comments_for(&self, order_id: Uuid) -> Result<Vec<OrderComment>, StoreError>;

	/// Comment on `order_id` created from courier event `event_id`, if any.
	async fn find_comment_by_event(
		&self,
		order_id: Uuid,
		event_id: &str,
	) -> Result<Option<OrderComment>, StoreError>;
}

/// In-process order store.
#[derive(Default)]
pub struct MemoryOrderStore {
	orders: Mutex<HashMap<Uuid, Order>>,
	comments: Mutex<Vec<OrderComment>>,
}

impl MemoryOrderStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace an order.
	pub fn insert(&self, order: Order) {
		self.orders.lock().insert(order.id, order);
	}

	pub fn len(&self) -> usize {
		self.orders.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
	async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
		Ok(self.orders.lock().get(&id).cloned())
	}

	async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, StoreError> {
		let mut orders = self.orders.lock();
		let order = orders
			.get_mut(&id)
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		update.apply_to(order);
		Ok(order.clone())
	}

	async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, StoreError> {
		let matches = |value: &Option<String>| {
			value
				.as_deref()
				.map(|v| v.eq_ignore_ascii_case(tracking_id))
				.unwrap_or(false)
		};
		Ok(self
			.orders
			.lock()
			.values()
			.find(|order| matches(&order.external_order_id) || matches(&order.waybill))
			.cloned())
	}

	async fn append_comment(&self, comment: OrderComment) -> Result<(), StoreError> {
		if !self.orders.lock().contains_key(&comment.order_id) {
			return Err(StoreError::NotFound(comment.order_id.to_string()));
		}
		self.comments.lock().push(comment);
		Ok(())
	}

	async fn comments_for(&self, order_id: Uuid) -> Result<Vec<OrderComment>, StoreError> {
		Ok(self
			.comments
			.lock()
			.iter()
			.filter(|c| c.order_id == order_id)
			.cloned()
			.collect())
	}

	async fn find_comment_by_event(
		&self,
		order_id: Uuid,
		event_id: &str,
	) -> Result<Option<OrderComment>, StoreError> {
		Ok(self
			.comments
			.lock()
			.iter()
			.find(|c| c.order_id == order_id && c.external_event_id.as_deref() == Some(event_id))
			.cloned())
	}
}
