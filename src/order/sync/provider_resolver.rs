//! Free-text courier partner → provider code.

use crate::courier::{DUMMY_CODE, GAAUBESI_CODE, NCM_CODE};

/// Aliases staff use for each courier, lower-case. Checked in order.
const ALIASES: &[(&str, &[&str])] = &[
	(NCM_CODE, &["nepal can move", "nepalcanmove", "ncm"]),
	(GAAUBESI_CODE, &["gaau besi", "gaaubesi", "gaau-besi", "gbl"]),
	(DUMMY_CODE, &["dummy", "test courier"]),
];

/// Provider code for a courier partner as typed on the order, matched case-insensitively by alias
/// substring. `None` when no alias matches.
pub fn resolve_provider_code(partner: &str) -> Option<&'static str> {
	let partner = partner.trim().to_lowercase();
	if partner.is_empty() {
		return None;
	}

	ALIASES
		.iter()
		.find(|(_, aliases)| aliases.iter().any(|alias| partner.contains(alias)))
		.map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_aliases() {
		assert_eq!(resolve_provider_code("Nepal Can Move"), Some("ncm"));
		assert_eq!(resolve_provider_code("NCM Express"), Some("ncm"));
		assert_eq!(resolve_provider_code("  Gaau Besi Logistics "), Some("gaaubesi"));
		assert_eq!(resolve_provider_code("GBL"), Some("gaaubesi"));
		assert_eq!(resolve_provider_code("Dummy"), Some("dummy"));
		assert_eq!(resolve_provider_code("Test Courier"), Some("dummy"));
	}

	#[test]
	fn test_unresolvable() {
		assert_eq!(resolve_provider_code("Pathao"), None);
		assert_eq!(resolve_provider_code(""), None);
		assert_eq!(resolve_provider_code("   "), None);
	}
}
