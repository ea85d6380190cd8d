//! Number formatting at the caller boundary.
//!
//! Metrics cross the adapter boundary as decimal strings. CPU percentages are
//! rounded to two decimals first; memory figures pass through as reported.

/// Rounds to two decimal places using the decimal rendering of the value
/// (half-to-even on the exact binary value), so `36.1352003502669` becomes
/// `36.14`.
pub fn round2(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

/// Renders a value in its shortest decimal form with at least one fractional
/// digit: `36.14`, `120.0`, `4190.64`.
pub fn format_decimal(value: f64) -> String {
    let mut s = value.to_string();
    if value.is_finite() && !s.contains('.') {
        s.push_str(".0");
    }
    s
}
