use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One referred player as returned by the affiliate API.
///
/// Amounts are coerced at decode time: missing, null or non-numeric values
/// become zero so downstream sums never fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub wagered: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub deposited: Decimal,
    /// Raw creation timestamp; parsed by the aggregator.
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<String>,
}

/// Envelope of `GET /api/affiliate/external`.
#[derive(Debug, Deserialize)]
pub struct LeaderboardResponse {
    pub data: Vec<LeaderboardRecord>,
}

/// A record placed on the leaderboard with its share of the total wager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    pub record: LeaderboardRecord,
    /// Percentage of the in-window total wagered, one decimal.
    pub share_pct: Decimal,
}

/// Totals and ranking for one window, recomputed on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub window_start: NaiveDate,
    pub total_wagered: Decimal,
    pub total_deposited: Decimal,
    pub player_count: usize,
    /// Records dropped because `createdAt` could not be parsed.
    pub excluded_unparseable: usize,
    /// All in-window records, highest wager first.
    pub ranked: Vec<RankedEntry>,
}

impl AggregateResult {
    /// The first `n` ranked entries.
    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.ranked[..self.ranked.len().min(n)]
    }
}

/// Chat-platform agnostic rendering of a message (maps onto a Discord embed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayDocument {
    pub title: String,
    pub description: String,
    pub fields: Vec<DisplayField>,
    pub colour: u32,
    pub timestamp: DateTime<Utc>,
    pub footer: String,
    pub footer_icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Identifier of a message sent to the leaderboard channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_decimal(&value))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Numeric coercion for API amounts: numbers and numeric strings parse,
/// everything else is zero.
pub fn coerce_decimal(value: &Value) -> Decimal {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Decimal::ZERO,
    };
    if text.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn record_full_fields() {
        let r: LeaderboardRecord = serde_json::from_value(json!({
            "name": "Alice",
            "wagered": 1500.25,
            "deposited": "300",
            "createdAt": "2025-04-01T12:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(r.name, "Alice");
        assert_eq!(r.wagered, dec!(1500.25));
        assert_eq!(r.deposited, dec!(300));
        assert_eq!(r.created_at.as_deref(), Some("2025-04-01T12:00:00.000Z"));
    }

    #[test]
    fn record_missing_and_garbage_amounts_are_zero() {
        let r: LeaderboardRecord = serde_json::from_value(json!({
            "name": "Bob",
            "wagered": "lots",
            "createdAt": null
        }))
        .unwrap();
        assert_eq!(r.wagered, Decimal::ZERO);
        assert_eq!(r.deposited, Decimal::ZERO);
        assert!(r.created_at.is_none());
    }

    #[test]
    fn record_numeric_timestamp_kept_as_text() {
        let r: LeaderboardRecord = serde_json::from_value(json!({
            "name": "Carol",
            "createdAt": 1743465600000u64
        }))
        .unwrap();
        assert_eq!(r.created_at.as_deref(), Some("1743465600000"));
    }

    #[test]
    fn coerce_variants() {
        assert_eq!(coerce_decimal(&json!(null)), Decimal::ZERO);
        assert_eq!(coerce_decimal(&json!(true)), Decimal::ZERO);
        assert_eq!(coerce_decimal(&json!([1])), Decimal::ZERO);
        assert_eq!(coerce_decimal(&json!("")), Decimal::ZERO);
        assert_eq!(coerce_decimal(&json!(" 42.5 ")), dec!(42.5));
        assert_eq!(coerce_decimal(&json!(7)), dec!(7));
        assert_eq!(coerce_decimal(&json!("1e3")), dec!(1000));
    }

    #[test]
    fn top_clamps_to_len() {
        let result = AggregateResult {
            window_start: NaiveDate::from_ymd_opt(2025, 3, 24).unwrap(),
            total_wagered: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            player_count: 0,
            excluded_unparseable: 0,
            ranked: Vec::new(),
        };
        assert!(result.top(10).is_empty());
    }
}
