//! Per-provider translation of raw courier statuses into [`CanonicalStatus`].

use super::types::CanonicalStatus;

use std::collections::HashMap;
use tracing::debug;

/// Raw status → canonical status table for one courier.
///
/// Keys are stored trimmed and lower-cased, so lookups are insensitive to the casing and padding
/// couriers are inconsistent about. Lookups never fail: a raw value missing from the table maps to
/// [`CanonicalStatus::Unknown`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusMap {
	entries: HashMap<String, CanonicalStatus>,
}

impl StatusMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_pairs(pairs: &[(&str, CanonicalStatus)]) -> Self {
		let mut map = Self::new();
		for (raw, canonical) in pairs {
			map.insert(raw, *canonical);
		}
		map
	}

	pub fn insert(&mut self, raw: &str, canonical: CanonicalStatus) {
		self.entries.insert(normalize_key(raw), canonical);
	}

	/// Overlay `other` on top of this map. Entries in `other` win.
	pub fn merge(&mut self, other: &StatusMap) {
		for (raw, canonical) in &other.entries {
			self.entries.insert(raw.clone(), *canonical);
		}
	}

	pub fn translate(&self, raw: &str) -> CanonicalStatus {
		match self.entries.get(&normalize_key(raw)) {
			Some(canonical) => *canonical,
			None => {
				debug!("Unmapped courier status {:?}, treating as unknown", raw);
				CanonicalStatus::Unknown
			}
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Built-in table for a provider code. Unknown codes get an empty table.
	pub fn builtin(provider_code: &str) -> Self {
		match provider_code {
			"ncm" => Self::ncm(),
			"gaaubesi" => Self::gaaubesi(),
			"dummy" => Self::dummy(),
			_ => Self::new(),
		}
	}

	pub fn ncm() -> Self {
		Self::from_pairs(&[
			("Pickup Order Created", CanonicalStatus::Pending),
			("Drop off Order Created", CanonicalStatus::Pending),
			("Order Created", CanonicalStatus::Pending),
			("Sent for Pickup", CanonicalStatus::Pending),
			("Pickup Complete", CanonicalStatus::PickedUp),
			("Drop off Order Collected", CanonicalStatus::PickedUp),
			("Dispatched", CanonicalStatus::InTransit),
			("Arrived", CanonicalStatus::InTransit),
			("Arrived at Branch", CanonicalStatus::InTransit),
			("Sent for Delivery", CanonicalStatus::OutForDelivery),
			("Delivered", CanonicalStatus::Delivered),
			("Delivery Failed", CanonicalStatus::FailedAttempt),
			("Hold", CanonicalStatus::FailedAttempt),
			("Return Dispatched", CanonicalStatus::Returning),
			("Returned to Branch", CanonicalStatus::Returning),
			("Returned", CanonicalStatus::Returned),
			("Return Complete", CanonicalStatus::Returned),
			("Cancelled", CanonicalStatus::Cancelled),
		])
	}

	pub fn gaaubesi() -> Self {
		Self::from_pairs(&[
			("Order Placed", CanonicalStatus::Pending),
			("Pickup Requested", CanonicalStatus::Pending),
			("Picked Up", CanonicalStatus::PickedUp),
			("Received at Warehouse", CanonicalStatus::PickedUp),
			("Dispatched", CanonicalStatus::InTransit),
			("In Transit", CanonicalStatus::InTransit),
			("Arrived at Destination Branch", CanonicalStatus::InTransit),
			("Out for Delivery", CanonicalStatus::OutForDelivery),
			("Delivered", CanonicalStatus::Delivered),
			("Undelivered", CanonicalStatus::FailedAttempt),
			("Customer Not Reachable", CanonicalStatus::FailedAttempt),
			("Rescheduled", CanonicalStatus::FailedAttempt),
			("Return in Process", CanonicalStatus::Returning),
			("Returned to Vendor", CanonicalStatus::Returned),
			("Cancelled", CanonicalStatus::Cancelled),
		])
	}

	pub fn dummy() -> Self {
		Self::from_pairs(&[
			("Pending Pickup", CanonicalStatus::Pending),
			("Picked Up", CanonicalStatus::PickedUp),
			("In Transit", CanonicalStatus::InTransit),
			("Out For Delivery", CanonicalStatus::OutForDelivery),
			("Delivered", CanonicalStatus::Delivered),
			("Failed Attempt", CanonicalStatus::FailedAttempt),
			("Returning", CanonicalStatus::Returning),
			("Returned", CanonicalStatus::Returned),
			("Cancelled", CanonicalStatus::Cancelled),
		])
	}
}

fn normalize_key(raw: &str) -> String {
	raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_translate_is_case_and_padding_insensitive() {
		let map = StatusMap::ncm();
		assert_eq!(map.translate("Pickup Complete"), CanonicalStatus::PickedUp);
		assert_eq!(map.translate("  pickup complete "), CanonicalStatus::PickedUp);
		assert_eq!(map.translate("DELIVERED"), CanonicalStatus::Delivered);
	}

	#[test]
	fn test_unmapped_status_is_unknown() {
		for map in [StatusMap::ncm(), StatusMap::gaaubesi(), StatusMap::dummy(), StatusMap::new()] {
			assert_eq!(map.translate("Teleported to Moon"), CanonicalStatus::Unknown);
			assert_eq!(map.translate(""), CanonicalStatus::Unknown);
		}
	}

	#[test]
	fn test_merge_overrides_builtin_entries() {
		let mut map = StatusMap::ncm();
		let extra = StatusMap::from_pairs(&[
			("Hold", CanonicalStatus::InTransit),
			("Sent to Sorting Hub", CanonicalStatus::InTransit),
		]);
		map.merge(&extra);

		assert_eq!(map.translate("hold"), CanonicalStatus::InTransit);
		assert_eq!(map.translate("Sent to Sorting Hub"), CanonicalStatus::InTransit);
		assert_eq!(map.translate("Delivered"), CanonicalStatus::Delivered);
	}

	#[test]
	fn test_builtin_by_code() {
		assert!(!StatusMap::builtin("ncm").is_empty());
		assert!(!StatusMap::builtin("gaaubesi").is_empty());
		assert!(StatusMap::builtin("pathao").is_empty());
	}
}
