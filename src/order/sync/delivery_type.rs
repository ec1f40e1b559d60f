//! Home delivery vs. branch pickup resolution.

use crate::order::DeliveryType;

/// Decide the delivery type for a courier push.
///
/// The persisted order field wins when it can be classified, since it records what the customer
/// chose at checkout. Older records hold free text, so it is matched loosely:
///
/// 1. `d2b`, or anything mentioning `pickup` or `branch` → [`DeliveryType::D2B`]
/// 2. `d2d`, or anything mentioning `home` or `door` → [`DeliveryType::D2D`]
///
/// A blank or unclassifiable persisted value falls through to `requested`, which selects `D2B` only
/// when it is exactly `D2B` (ignoring case). Everything else resolves to `D2D`.
pub fn resolve(persisted: Option<&str>, requested: Option<&str>) -> DeliveryType {
	if let Some(persisted) = persisted.map(str::trim).filter(|p| !p.is_empty()) {
		let value = persisted.to_lowercase();
		if value == "d2b" || value.contains("pickup") || value.contains("branch") {
			return DeliveryType::D2B;
		}
		if value == "d2d" || value.contains("home") || value.contains("door") {
			return DeliveryType::D2D;
		}
	}

	match requested.map(str::trim) {
		Some(requested) if requested.eq_ignore_ascii_case("d2b") => DeliveryType::D2B,
		_ => DeliveryType::D2D,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use DeliveryType::{D2B, D2D};

	#[test]
	fn test_persisted_value_wins_over_override() {
		let cases = [
			("D2B", D2B),
			("d2b", D2B),
			(" Branch Pickup ", D2B),
			("pickup", D2B),
			("branch", D2B),
			("D2D", D2D),
			("home delivery", D2D),
			("Door to Door", D2D),
		];
		for (persisted, expected) in cases {
			for requested in [None, Some("D2B"), Some("D2D"), Some("garbage")] {
				assert_eq!(
					resolve(Some(persisted), requested),
					expected,
					"persisted {persisted:?} requested {requested:?}"
				);
			}
		}
	}

	#[test]
	fn test_pickup_wins_when_both_keywords_present() {
		assert_eq!(resolve(Some("home or branch pickup"), None), D2B);
	}

	#[test]
	fn test_override_used_when_persisted_missing_or_unclassifiable() {
		for persisted in [None, Some(""), Some("   "), Some("express"), Some("d2x")] {
			assert_eq!(resolve(persisted, Some("D2B")), D2B);
			assert_eq!(resolve(persisted, Some("d2b")), D2B);
			assert_eq!(resolve(persisted, Some(" d2b ")), D2B);
			assert_eq!(resolve(persisted, Some("D2D")), D2D);
			assert_eq!(resolve(persisted, Some("pickup")), D2D);
			assert_eq!(resolve(persisted, Some("")), D2D);
		}
	}

	#[test]
	fn test_defaults_to_home_delivery() {
		assert_eq!(resolve(None, None), D2D);
		assert_eq!(resolve(Some(""), None), D2D);
		assert_eq!(resolve(Some("unknown"), None), D2D);
	}
}
