use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::api::{LeaderboardSource, find_user};
use crate::engine::aggregate;
use crate::error::ServiceError;
use crate::publisher::{ChannelTransport, Publisher};
use crate::reporter::{MAX_CUSTOM_MESSAGE_CHARS, render_leaderboard, render_user};
use crate::state::BotState;
use crate::types::{DisplayDocument, MessageId};

/// Reply shown when the affiliate API could not be read.
pub const FETCH_ERROR_REPLY: &str = "❌ Sorry, there was an error fetching the leaderboard data.";

/// Reply shown when a reply could not be built for any other reason.
pub const PUBLISH_ERROR_REPLY: &str = "❌ An error occurred while processing the leaderboard data.";

/// The fetch → aggregate → render → publish pipeline, shared by the
/// scheduler and the command handlers.
pub struct LeaderboardService<S, T> {
    source: S,
    publisher: Publisher<T>,
    state: BotState,
    affiliate_code: String,
    default_start_date: NaiveDate,
}

impl<S, T> LeaderboardService<S, T>
where
    S: LeaderboardSource,
    T: ChannelTransport,
{
    pub fn new(
        source: S,
        transport: T,
        affiliate_code: &str,
        default_start_date: NaiveDate,
    ) -> Self {
        Self {
            source,
            publisher: Publisher::new(transport),
            state: BotState::new(),
            affiliate_code: affiliate_code.to_string(),
            default_start_date,
        }
    }

    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    pub fn default_start_date(&self) -> NaiveDate {
        self.default_start_date
    }

    /// Fetch and render the leaderboard for the window opening on `start`.
    async fn build_leaderboard(&self, start: NaiveDate) -> Result<DisplayDocument, ServiceError> {
        let records = self.source.fetch().await?;
        let result = aggregate(&records, start)?;
        info!(
            "Aggregated {} player(s) since {start} (wagered ${}, deposited ${})",
            result.player_count, result.total_wagered, result.total_deposited,
        );
        let custom_message = self.state.custom_message().await;
        Ok(render_leaderboard(
            &result,
            &self.affiliate_code,
            &custom_message,
            Utc::now(),
        ))
    }

    /// Scheduled flow: rebuild the leaderboard for the default window and
    /// replace the message in the channel.
    ///
    /// Nothing is sent when the source fails.
    pub async fn refresh_channel(&self) -> Result<MessageId, ServiceError> {
        let document = self.build_leaderboard(self.default_start_date).await?;
        let id = self.publisher.publish(&document).await?;
        Ok(id)
    }

    /// `/leaderboard [start_date]`: the leaderboard as a direct reply.
    pub async fn leaderboard_report(
        &self,
        start_date: Option<&str>,
    ) -> Result<DisplayDocument, ServiceError> {
        let start = match start_date {
            Some(input) => parse_start_date(input)?,
            None => self.default_start_date,
        };
        self.build_leaderboard(start).await
    }

    /// `/user <username>`: `None` when no player has that name or the name is
    /// blank.
    pub async fn lookup_user(
        &self,
        username: &str,
    ) -> Result<Option<DisplayDocument>, ServiceError> {
        let records = self.source.fetch().await?;
        Ok(find_user(&records, username).map(|record| render_user(record, Utc::now())))
    }

    /// `/setmessage [message]`: returns the confirmation for the requester.
    ///
    /// Messages longer than [`MAX_CUSTOM_MESSAGE_CHARS`] are rejected and the
    /// current message is kept.
    pub async fn set_custom_message(
        &self,
        message: Option<&str>,
    ) -> Result<&'static str, ServiceError> {
        let message = message.unwrap_or_default();
        let len = message.chars().count();
        if len > MAX_CUSTOM_MESSAGE_CHARS {
            return Err(ServiceError::MessageTooLong {
                len,
                max: MAX_CUSTOM_MESSAGE_CHARS,
            });
        }
        self.state.set_custom_message(message).await;
        if message.is_empty() {
            info!("Custom message cleared");
            Ok("✅ Custom message has been removed!")
        } else {
            info!("Custom message set ({len} chars)");
            Ok("✅ Custom message has been set!")
        }
    }

    pub async fn custom_message(&self) -> String {
        self.state.custom_message().await
    }

    /// Refresh the channel every `period`, one cycle at a time.
    ///
    /// Failed cycles are logged and skipped; the next tick is the retry.
    pub async fn run_scheduler(self: Arc<Self>, period: Duration, publish_on_startup: bool) {
        let first_tick = if publish_on_startup {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduler started (interval: {}s)", period.as_secs());
        loop {
            ticker.tick().await;
            info!("Scheduled leaderboard update at {}", Utc::now().to_rfc3339());
            match self.refresh_channel().await {
                Ok(id) => info!("Scheduled update published (message {id})"),
                Err(ServiceError::Source(e)) => warn!(
                    malformed = e.is_malformed(),
                    "Skipping scheduled update, source unavailable: {e}"
                ),
                Err(e) => warn!("Scheduled update failed: {e}"),
            }
        }
    }
}

/// Parse a `/leaderboard` start date (`YYYY-MM-DD`).
pub fn parse_start_date(input: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ServiceError::InvalidStartDate {
        input: input.to_string(),
    })
}

/// User-facing text for a failed command.
pub fn error_reply(err: &ServiceError) -> String {
    match err {
        ServiceError::Source(_) => FETCH_ERROR_REPLY.to_string(),
        ServiceError::InvalidStartDate { input } => {
            format!("❌ Invalid start_date \"{input}\". Use the format YYYY-MM-DD.")
        }
        ServiceError::Publish(_) => PUBLISH_ERROR_REPLY.to_string(),
        ServiceError::MessageTooLong { len, max } => {
            format!("❌ Custom message is too long ({len} characters). Use at most {max}.")
        }
    }
}
