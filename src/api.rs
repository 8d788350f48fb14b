use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::types::{LeaderboardRecord, LeaderboardResponse};

/// Longest error body kept in logs and errors.
const MAX_ERROR_BODY: usize = 512;

/// Anything that can produce the current leaderboard records.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<LeaderboardRecord>, SourceError>;
}

/// Client for the X.fun affiliate API.
///
/// Every `fetch` hits the network; nothing is cached and nothing is retried.
pub struct XfunClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    code: String,
}

impl XfunClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        code: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SourceError::Request)?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            code: code.to_string(),
        })
    }
}

#[async_trait]
impl LeaderboardSource for XfunClient {
    async fn fetch(&self) -> Result<Vec<LeaderboardRecord>, SourceError> {
        debug!("Fetching leaderboard for code {}", self.code);

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("code", self.code.as_str())])
            .header("X-Apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("Leaderboard request failed: {e}");
                SourceError::Request(e)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            warn!("Failed to read leaderboard response body: {e}");
            SourceError::Request(e)
        })?;

        if !status.is_success() {
            let body = truncate(&body, MAX_ERROR_BODY);
            warn!("Leaderboard API returned {status}: {body}");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records = parse_leaderboard_body(&body).inspect_err(|e| {
            warn!("Leaderboard API response rejected: {e}");
        })?;
        debug!("Fetched {} leaderboard records", records.len());
        Ok(records)
    }
}

/// Decode an API response body into records.
///
/// The body must be an object with a `data` array.
pub fn parse_leaderboard_body(body: &str) -> Result<Vec<LeaderboardRecord>, SourceError> {
    serde_json::from_str::<LeaderboardResponse>(body)
        .map(|resp| resp.data)
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Find a player by name, ignoring case. Only exact matches count and a blank
/// name matches nobody.
pub fn find_user<'a>(
    records: &'a [LeaderboardRecord],
    username: &str,
) -> Option<&'a LeaderboardRecord> {
    if username.trim().is_empty() {
        return None;
    }
    let wanted = username.to_lowercase();
    records.iter().find(|r| r.name.to_lowercase() == wanted)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn named(name: &str) -> LeaderboardRecord {
        LeaderboardRecord {
            name: name.to_string(),
            wagered: dec!(0),
            deposited: dec!(0),
            created_at: None,
        }
    }

    // ── parse_leaderboard_body ─────────────────────────────────────

    #[test]
    fn parse_valid_body() {
        let body = r#"{
            "data": [
                {"name": "A", "wagered": 100, "deposited": 10, "createdAt": "2025-04-01"},
                {"name": "B", "wagered": "50.5", "deposited": null, "createdAt": "2025-01-01"}
            ],
            "total": 2
        }"#;
        let records = parse_leaderboard_body(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].wagered, dec!(100));
        assert_eq!(records[1].wagered, dec!(50.5));
        assert_eq!(records[1].deposited, dec!(0));
    }

    #[test]
    fn parse_empty_data() {
        assert!(parse_leaderboard_body(r#"{"data": []}"#).unwrap().is_empty());
    }

    #[test]
    fn parse_missing_data_is_malformed() {
        let err = parse_leaderboard_body(r#"{"error": "nope"}"#).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn parse_non_json_is_malformed() {
        let err = parse_leaderboard_body("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn parse_data_not_array_is_malformed() {
        assert!(parse_leaderboard_body(r#"{"data": {"name": "A"}}"#).is_err());
    }

    // ── find_user ──────────────────────────────────────────────────

    #[test]
    fn find_user_case_insensitive() {
        let records = vec![named("Bob"), named("Alice")];
        assert_eq!(find_user(&records, "alice").unwrap().name, "Alice");
        assert_eq!(find_user(&records, "ALICE").unwrap().name, "Alice");
    }

    #[test]
    fn find_user_no_partial_match() {
        let records = vec![named("Alice")];
        assert!(find_user(&records, "alic").is_none());
        assert!(find_user(&records, "alice ").is_none());
    }

    #[test]
    fn find_user_blank_matches_nobody() {
        let records = vec![named(""), named("   "), named("Alice")];
        assert!(find_user(&records, "").is_none());
        assert!(find_user(&records, "   ").is_none());
    }

    #[test]
    fn find_user_first_match_wins() {
        let mut second = named("alice");
        second.wagered = dec!(5);
        let records = vec![named("ALICE"), second];
        assert_eq!(find_user(&records, "Alice").unwrap().name, "ALICE");
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
