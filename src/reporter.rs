use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use crate::TOP_PLAYERS;
use crate::engine::parse_created_at;
use crate::error::{DeleteError, TransportError};
use crate::publisher::ChannelTransport;
use crate::types::{AggregateResult, DisplayDocument, DisplayField, LeaderboardRecord, MessageId};

/// Prize banner shown at the top of every leaderboard.
pub const REWARD_BANNER: &str = "**X.FUN LEADERBOARD REWARDS**\n🥇$200\n🥈$125\n🥉$75";

/// Longest custom message accepted by `/setmessage`.
///
/// Keeps the leaderboard description under Discord's 4096 character embed
/// limit together with the banner and statistics block.
pub const MAX_CUSTOM_MESSAGE_CHARS: usize = 3000;

const LEADERBOARD_COLOUR: u32 = 0xFFD700;
const USER_COLOUR: u32 = 0x3498DB;
const FOOTER_ICON_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// Medal for a zero-based leaderboard position.
pub fn medal(position: usize) -> &'static str {
    match position {
        0 => "🥇",
        1 => "🥈",
        2 => "🥉",
        _ => "🎮",
    }
}

/// Format an amount with two decimals and comma thousands separators.
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}

/// Long-form calendar date, e.g. "March 24, 2025".
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Build the channel / `/leaderboard` document.
///
/// `custom_message` is inserted verbatim between the reward banner and the
/// statistics block when non-empty.
pub fn render_leaderboard(
    result: &AggregateResult,
    affiliate_code: &str,
    custom_message: &str,
    generated_at: DateTime<Utc>,
) -> DisplayDocument {
    let mut description = format!("{REWARD_BANNER}\n\n");
    if !custom_message.is_empty() {
        description.push_str(custom_message);
        description.push_str("\n\n");
    }
    description.push_str(&format!(
        "**📊 Statistics Overview**\n\
         > 👥 Total Players: **{}**\n\
         > 💰 Total Wagered: **${}**\n\
         > 💵 Total Deposited: **${}**\n\
         > 📅 Since: **{}**\n\n\
         **🎯 Top {TOP_PLAYERS} Players**",
        result.player_count,
        format_usd(result.total_wagered),
        format_usd(result.total_deposited),
        format_long_date(result.window_start),
    ));

    let fields = result
        .top(TOP_PLAYERS)
        .iter()
        .enumerate()
        .map(|(idx, entry)| DisplayField {
            name: format!("{} {}. {}", medal(idx), idx + 1, entry.record.name),
            value: format!(
                "💵 **${}** deposited • 💰 **${}** wagered *({:.1}% of total)*",
                format_usd(entry.record.deposited),
                format_usd(entry.record.wagered),
                entry.share_pct,
            ),
            inline: false,
        })
        .collect();

    DisplayDocument {
        title: format!("🏆 X.fun Leaderboard - {affiliate_code}"),
        description,
        fields,
        colour: LEADERBOARD_COLOUR,
        timestamp: generated_at,
        footer: "Last Updated".to_string(),
        footer_icon_url: Some(FOOTER_ICON_URL.to_string()),
    }
}

/// Build the `/user` lookup document.
pub fn render_user(record: &LeaderboardRecord, generated_at: DateTime<Utc>) -> DisplayDocument {
    let joined = record
        .created_at
        .as_deref()
        .and_then(parse_created_at)
        .map(|dt| format_long_date(dt.date_naive()))
        .unwrap_or_else(|| "Unknown".to_string());

    DisplayDocument {
        title: format!("👤 User Details - {}", record.name),
        description: format!(
            "**📊 Statistics**\n\
             > 💵 Deposited: **${}**\n\
             > 💰 Wagered: **${}**\n\
             > 📅 Joined: **{joined}**",
            format_usd(record.deposited),
            format_usd(record.wagered),
        ),
        fields: Vec::new(),
        colour: USER_COLOUR,
        timestamp: generated_at,
        footer: "User Info".to_string(),
        footer_icon_url: Some(FOOTER_ICON_URL.to_string()),
    }
}

/// Emit a rendered document as a single JSON line to stdout (dry-run output).
pub fn report_document(document: &DisplayDocument) {
    if let Ok(json) = serde_json::to_string(document) {
        println!("{json}");
    }
}

/// Dry-run channel: every published document goes to stdout instead of Discord.
#[derive(Default)]
pub struct StdoutChannel {
    next_id: AtomicU64,
}

#[async_trait]
impl ChannelTransport for StdoutChannel {
    async fn send(&self, document: &DisplayDocument) -> Result<MessageId, TransportError> {
        report_document(document);
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn delete(&self, id: MessageId) -> Result<(), DeleteError> {
        info!("[dry-run] would delete message {id}");
        Ok(())
    }
}
