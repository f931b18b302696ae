//! # Runtime Settings
//!
//! Parsers for values stored in the `app_settings` table.
//!
//! Settings are edited by the back office and stored as JSON text, so the
//! same logical value shows up in several shapes. Parsers here accept all of
//! them and fall back to the default instead of failing a sale or refund.
//!
//! ```text
//! refund.window_days   →  2   "2"   [2]   {"days": 2}   {"value": "2"}
//! ```

use serde_json::Value;

/// Setting key for the refund window.
pub const REFUND_WINDOW_DAYS_KEY: &str = "refund.window_days";

/// Refund window used when the setting is absent or unusable.
pub const DEFAULT_REFUND_WINDOW_DAYS: i64 = 2;

/// Reads the refund window from the raw stored setting.
///
/// ## Accepted Shapes
/// - number: `2`, `2.0`
/// - numeric string: `"2"`
/// - array: first element, any accepted shape
/// - object: `days`, else `value`, any accepted shape
/// - non-JSON text: parsed as a bare number
///
/// Missing, negative, or unparsable values yield
/// [`DEFAULT_REFUND_WINDOW_DAYS`].
///
/// ## Example
/// ```rust
/// use kasir_core::settings::refund_window_days;
///
/// assert_eq!(refund_window_days(Some(r#"{"days": 7}"#)), 7);
/// assert_eq!(refund_window_days(Some("[3]")), 3);
/// assert_eq!(refund_window_days(Some("oops")), 2);
/// assert_eq!(refund_window_days(None), 2);
/// ```
pub fn refund_window_days(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return DEFAULT_REFUND_WINDOW_DAYS;
    };

    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(value) => days_from_value(&value),
        Err(_) => days_from_str(raw),
    };

    parsed
        .filter(|days| *days >= 0)
        .unwrap_or(DEFAULT_REFUND_WINDOW_DAYS)
}

fn days_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => days_from_str(s),
        Value::Array(items) => items.first().and_then(days_from_value),
        Value::Object(map) => map
            .get("days")
            .or_else(|| map.get("value"))
            .and_then(days_from_value),
        Value::Bool(_) | Value::Null => None,
    }
}

fn days_from_str(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
