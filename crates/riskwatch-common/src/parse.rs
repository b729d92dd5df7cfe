//! Tolerant parsing of loosely-typed fields coming from the synchronized
//! task table. Nothing here fails hard: an unusable value becomes `None`.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Epoch values above this are milliseconds, below are seconds.
const MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Parses a date field into a calendar date in the given business timezone.
///
/// Accepted forms: `YYYY-MM-DD`, `YYYY/MM/DD`, RFC 3339 timestamps, and
/// epoch seconds or milliseconds (as a number or a digit-only string).
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, NaiveDate};
/// use riskwatch_common::parse::parse_date;
/// use serde_json::json;
///
/// let tz = FixedOffset::east_opt(8 * 3600).unwrap();
/// let expected = NaiveDate::from_ymd_opt(2026, 3, 13);
/// assert_eq!(parse_date(&json!("2026-03-13"), tz), expected);
/// assert_eq!(parse_date(&json!("2026/03/13"), tz), expected);
/// assert_eq!(parse_date(&json!("not a date"), tz), None);
/// ```
pub fn parse_date(value: &Value, tz: FixedOffset) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s, tz),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|epoch| date_from_epoch(epoch, tz)),
        _ => None,
    }
}

fn parse_date_str(raw: &str, tz: FixedOffset) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&tz).date_naive());
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|epoch| date_from_epoch(epoch, tz));
    }
    None
}

fn date_from_epoch(epoch: i64, tz: FixedOffset) -> Option<NaiveDate> {
    let ts = if epoch.abs() >= MILLIS_CUTOFF {
        DateTime::from_timestamp_millis(epoch)?
    } else {
        DateTime::from_timestamp(epoch, 0)?
    };
    Some(ts.with_timezone(&tz).date_naive())
}

/// Parses a progress field into a percentage within `0.0..=100.0`.
///
/// Numbers are taken as percentages; strings may carry a trailing `%`.
/// Values outside the range are clamped, non-numeric input yields `None`.
///
/// # Examples
///
/// ```
/// use riskwatch_common::parse::parse_progress;
/// use serde_json::json;
///
/// assert_eq!(parse_progress(&json!(50)), Some(50.0));
/// assert_eq!(parse_progress(&json!(" 75% ")), Some(75.0));
/// assert_eq!(parse_progress(&json!(140)), Some(100.0));
/// assert_eq!(parse_progress(&json!("n/a")), None);
/// ```
pub fn parse_progress(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_suffix('%').unwrap_or(s).trim();
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0))
}

/// Serde helper: reads a flag that the source table may encode as a bool,
/// a number, or a text label ("是" / "true" / "yes" / "1").
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "是" | "true" | "yes" | "y" | "1"
        ),
        _ => false,
    })
}

/// Serde helper: reads a free-text field that may arrive as a non-string
/// JSON scalar. Scalars are rendered to their JSON text, null stays `None`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn epoch_millis_use_business_timezone() {
        // 2026-03-12T16:30:00Z is already 2026-03-13 in UTC+8
        let millis = 1_773_333_000_000_i64;
        assert_eq!(
            parse_date(&json!(millis), cst()),
            NaiveDate::from_ymd_opt(2026, 3, 13)
        );
        assert_eq!(
            parse_date(&json!(millis.to_string()), cst()),
            NaiveDate::from_ymd_opt(2026, 3, 13)
        );
    }

    #[test]
    fn rfc3339_is_converted_before_taking_the_date() {
        assert_eq!(
            parse_date(&json!("2026-03-12T20:00:00Z"), cst()),
            NaiveDate::from_ymd_opt(2026, 3, 13)
        );
    }

    #[test]
    fn unusable_dates_are_none() {
        assert_eq!(parse_date(&json!(""), cst()), None);
        assert_eq!(parse_date(&json!(true), cst()), None);
        assert_eq!(parse_date(&json!("2026-13-45"), cst()), None);
        assert_eq!(parse_date(&Value::Null, cst()), None);
    }

    #[test]
    fn progress_variants() {
        assert_eq!(parse_progress(&json!(0)), Some(0.0));
        assert_eq!(parse_progress(&json!(33.5)), Some(33.5));
        assert_eq!(parse_progress(&json!("80")), Some(80.0));
        assert_eq!(parse_progress(&json!(-5)), Some(0.0));
        assert_eq!(parse_progress(&json!("")), None);
        assert_eq!(parse_progress(&json!(null)), None);
        assert_eq!(parse_progress(&json!(["50"])), None);
    }
}
