//! Lenient timestamp handling.
//!
//! Cached posts may carry unix milliseconds or RFC 3339 strings depending on
//! which client wrote them. Anything unreadable becomes `None`, which the
//! direction resolver treats as epoch zero.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize an optional unix-ms timestamp from a number or a date string.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_value))
}

/// Parse a JSON value into unix milliseconds.
#[allow(clippy::cast_possible_truncation)] // fractional ms are dropped
pub fn parse_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => parse_str(text),
        _ => None,
    }
}

/// Parse an RFC 3339 string or a numeric string into unix milliseconds.
pub fn parse_str(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Some(millis);
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|date_time| date_time.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "lenient")]
        at: Option<i64>,
    }

    fn parse(json: &str) -> Option<i64> {
        serde_json::from_str::<Holder>(json).unwrap().at
    }

    #[test]
    fn accepts_numbers_and_rfc3339() {
        assert_eq!(parse(r#"{"at": 1700000000000}"#), Some(1_700_000_000_000));
        assert_eq!(
            parse(r#"{"at": "2023-11-14T22:13:20Z"}"#),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn garbage_and_missing_become_none() {
        assert_eq!(parse(r#"{"at": "not a date"}"#), None);
        assert_eq!(parse(r#"{"at": null}"#), None);
        assert_eq!(parse(r#"{"at": [1]}"#), None);
        assert_eq!(parse("{}"), None);
    }
}
