//! Per-key async locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per key so work on the same key runs serially while different keys
/// proceed concurrently.
///
/// Entries are dropped once no task holds or waits on them.
pub struct KeyedLocks<K> {
	locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
	pub fn new() -> Self {
		Self {
			locks: Mutex::new(HashMap::new()),
		}
	}

	/// Wait for exclusive access to `key`.
	pub async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
		let lock = {
			let mut locks = self.locks.lock();
			locks
				.entry(key.clone())
				.or_insert_with(|| Arc::new(AsyncMutex::new(())))
				.clone()
		};

		let guard = lock.lock_owned().await;
		KeyedGuard {
			owner: self,
			key: key.clone(),
			guard: Some(guard),
		}
	}

	/// Number of keys currently tracked.
	pub fn len(&self) -> usize {
		self.locks.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn release(&self, key: &K) {
		let mut locks = self.locks.lock();
		if let Some(lock) = locks.get(key) {
			// Only the map still references it: nobody holds or waits on this key.
			if Arc::strong_count(lock) == 1 {
				locks.remove(key);
			}
		}
	}
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
	fn default() -> Self {
		Self::new()
	}
}

pub struct KeyedGuard<'a, K: Eq + Hash + Clone> {
	owner: &'a KeyedLocks<K>,
	key: K,
	guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
	fn drop(&mut self) {
		// Release the mutex first so its Arc no longer counts as held.
		self.guard.take();
		self.owner.release(&self.key);
	}
}
