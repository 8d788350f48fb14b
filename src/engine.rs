use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::SourceError;
use crate::types::{AggregateResult, LeaderboardRecord, RankedEntry};

/// Parse a record's `createdAt` value.
///
/// Accepts RFC 3339, naive ISO date-times (read as UTC), plain dates
/// (midnight UTC) and integer epoch milliseconds.
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(window_cutoff(date));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return DateTime::from_timestamp_millis(millis);
    }
    None
}

/// Instant a window starting on `date` opens (midnight UTC).
pub fn window_cutoff(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Percentage of `total` contributed by `amount`, rounded to one decimal.
///
/// Zero when `total` is zero or the percentage is not representable.
pub fn share_of_total(amount: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    amount
        .checked_div(total)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
        .unwrap_or(Decimal::ZERO)
}

/// Sum of `amounts`, or a malformed-response error when it overflows.
fn checked_total(
    mut amounts: impl Iterator<Item = Decimal>,
    field: &str,
) -> Result<Decimal, SourceError> {
    amounts
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| SourceError::Malformed(format!("total {field} overflows")))
}

/// Filter, total and rank `records` for the window opening on `window_start`.
///
/// Records whose `createdAt` is missing or unparseable are outside the window.
/// Ranking is a stable sort on `wagered` (descending) so equal wagers keep
/// their API order.
///
/// Fails only when the in-window totals do not fit in a `Decimal`.
pub fn aggregate(
    records: &[LeaderboardRecord],
    window_start: NaiveDate,
) -> Result<AggregateResult, SourceError> {
    let cutoff = window_cutoff(window_start);

    let mut in_window: Vec<&LeaderboardRecord> = Vec::new();
    let mut excluded_unparseable = 0;
    for record in records {
        match record.created_at.as_deref().and_then(parse_created_at) {
            Some(created) if created >= cutoff => in_window.push(record),
            Some(_) => {}
            None => excluded_unparseable += 1,
        }
    }

    if excluded_unparseable > 0 {
        debug!("Excluded {excluded_unparseable} record(s) with unparseable createdAt");
    }

    let total_wagered = checked_total(in_window.iter().map(|r| r.wagered), "wagered")?;
    let total_deposited = checked_total(in_window.iter().map(|r| r.deposited), "deposited")?;
    let player_count = in_window.len();

    in_window.sort_by(|a, b| b.wagered.cmp(&a.wagered));

    let ranked = in_window
        .into_iter()
        .enumerate()
        .map(|(idx, record)| RankedEntry {
            rank: idx + 1,
            record: record.clone(),
            share_pct: share_of_total(record.wagered, total_wagered),
        })
        .collect();

    Ok(AggregateResult {
        window_start,
        total_wagered,
        total_deposited,
        player_count,
        excluded_unparseable,
        ranked,
    })
}
