//! Field sanitization shared by every courier adapter.

use crate::order::ValidationError;

/// Number of digits in a domestic mobile number.
pub const PHONE_DIGITS: usize = 10;

/// Maximum accepted tracking id length before it reaches a store query.
const MAX_TRACKING_ID_LEN: usize = 64;

/// Reduce a phone number to its last ten digits.
///
/// Everything that is not an ASCII digit is dropped first, so country codes and separators
/// (`"+977-98-4512-3456"`) collapse to `"9845123456"`. Fewer than ten digits is a rejection.
pub fn sanitize_phone(raw: &str) -> Result<String, ValidationError> {
	let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
	if digits.len() < PHONE_DIGITS {
		return Err(ValidationError::InvalidPhone(raw.to_string()));
	}
	Ok(digits[digits.len() - PHONE_DIGITS..].iter().collect())
}

/// Trimmed customer name, rejected when empty.
pub fn sanitize_name(raw: Option<&str>) -> Result<String, ValidationError> {
	match raw.map(str::trim) {
		Some(name) if !name.is_empty() => Ok(name.to_string()),
		_ => Err(ValidationError::MissingCustomerName),
	}
}

/// Trimmed address, falling back to `fallback` (then a fixed placeholder) so couriers never
/// receive an empty string.
pub fn sanitize_address(raw: Option<&str>, fallback: Option<&str>) -> String {
	[raw, fallback]
		.into_iter()
		.flatten()
		.map(str::trim)
		.find(|value| !value.is_empty())
		.map(str::to_string)
		.unwrap_or_else(|| "Address not provided".to_string())
}

/// Cash to collect on delivery: the rounded payable amount for COD orders, zero otherwise.
pub fn cod_charge(payable_amount: f64, cash_on_delivery: bool) -> i64 {
	if cash_on_delivery && payable_amount.is_finite() {
		payable_amount.round() as i64
	} else {
		0
	}
}

/// Accept a tracking id from an untrusted source only if it consists of alphanumerics and `-`, `_`,
/// `.`, `/` and is at most 64 characters long once trimmed.
///
/// Anything else is rejected rather than cleaned up, so a callback can never match an order other
/// than the one it named.
pub fn sanitize_tracking_id(raw: &str) -> Option<String> {
	let trimmed = raw.trim();
	let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/');

	if trimmed.is_empty() || trimmed.len() > MAX_TRACKING_ID_LEN || !trimmed.chars().all(allowed) {
		return None;
	}
	Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_phone_keeps_trailing_ten_digits() {
		assert_eq!(sanitize_phone("+977-98-4512-3456").unwrap(), "9845123456");
		assert_eq!(sanitize_phone("9845123456").unwrap(), "9845123456");
		assert_eq!(sanitize_phone(" 98451 23456 ").unwrap(), "9845123456");
	}

	#[test]
	fn test_phone_rejects_short_numbers() {
		assert_eq!(
			sanitize_phone("984-512"),
			Err(ValidationError::InvalidPhone("984-512".to_string()))
		);
		assert!(sanitize_phone("").is_err());
		assert!(sanitize_phone("phone").is_err());
	}

	#[test]
	fn test_phone_result_is_always_ten_digits() {
		let inputs = [
			"+977 9845123456",
			"00977-9845123456",
			"123456789",
			"12345678901234567890",
			"९८४५१२३४५६",
			"(01) 4-123-456",
			"98x45y12z34w56",
		];
		for input in inputs {
			match sanitize_phone(input) {
				Ok(phone) => {
					assert_eq!(phone.len(), PHONE_DIGITS, "input {input:?}");
					assert!(phone.chars().all(|c| c.is_ascii_digit()));
				}
				Err(ValidationError::InvalidPhone(raw)) => assert_eq!(raw, input),
				Err(other) => panic!("unexpected error {other:?}"),
			}
		}
	}

	#[test]
	fn test_name_and_address() {
		assert_eq!(sanitize_name(Some("  Ram Thapa ")).unwrap(), "Ram Thapa");
		assert_eq!(sanitize_name(Some("   ")), Err(ValidationError::MissingCustomerName));
		assert_eq!(sanitize_name(None), Err(ValidationError::MissingCustomerName));

		assert_eq!(sanitize_address(Some(" Lakeside-6 "), Some("POKHARA")), "Lakeside-6");
		assert_eq!(sanitize_address(Some(" "), Some("POKHARA")), "POKHARA");
		assert_eq!(sanitize_address(None, None), "Address not provided");
	}

	#[test]
	fn test_cod_charge() {
		assert_eq!(cod_charge(1200.0, true), 1200);
		assert_eq!(cod_charge(1199.5, true), 1200);
		assert_eq!(cod_charge(1199.49, true), 1199);
		assert_eq!(cod_charge(1200.0, false), 0);
		assert_eq!(cod_charge(f64::NAN, true), 0);
	}

	#[test]
	fn test_tracking_id_sanitization() {
		assert_eq!(sanitize_tracking_id(" NCM555 ").as_deref(), Some("NCM555"));
		assert_eq!(sanitize_tracking_id("GB-77/a_b.c").as_deref(), Some("GB-77/a_b.c"));
		assert_eq!(sanitize_tracking_id(&"A".repeat(64)).map(|s| s.len()), Some(64));
	}

	#[test]
	fn test_tracking_id_with_foreign_characters_is_rejected() {
		assert_eq!(sanitize_tracking_id("NCM 1"), None);
		assert_eq!(sanitize_tracking_id("NCM'1"), None);
		assert_eq!(sanitize_tracking_id("NCM555'; DROP TABLE orders;--"), None);
		assert_eq!(sanitize_tracking_id("%$#"), None);
		assert_eq!(sanitize_tracking_id("   "), None);
		assert_eq!(sanitize_tracking_id(&"A".repeat(65)), None);
	}
}
