//! Phone number normalization and formatting.

/// Strip everything but digits. An 11-digit number with a leading US
/// country code is normalized to its 10-digit form.
pub fn unformat_phone_number(input: &str) -> String {
  let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

  if digits.len() == 11 && digits.starts_with('1') {
    digits[1..].to_string()
  } else {
    digits
  }
}

/// Progressively format a number as `(123) 456-7890`.
///
/// Partial inputs format as far as the digits go; inputs normalizing
/// beyond ten digits are returned unchanged so no digits are lost.
pub fn format_phone_number(input: &str) -> String {
  let digits = unformat_phone_number(input);

  match digits.len() {
    0 => String::new(),
    1..=3 => format!("({}", digits),
    4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
    7..=10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    _ => input.to_string(),
  }
}

/// A number is valid when it normalizes to exactly ten digits.
pub fn is_valid_phone_number(input: &str) -> bool {
  unformat_phone_number(input).len() == 10
}
