//! Discord side of the bot: the channel transport used by the publisher, the
//! slash command schemas, and the gateway event handler that answers them and
//! starts the scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serenity::all::{
    ChannelId, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse, EventHandler,
    Interaction, MessageId as DiscordMessageId, Permissions, Ready, Timestamp,
};
use serenity::http::{Http, HttpError};
use tracing::{debug, error, info, warn};

use crate::api::LeaderboardSource;
use crate::error::{DeleteError, TransportError};
use crate::publisher::ChannelTransport;
use crate::reporter::MAX_CUSTOM_MESSAGE_CHARS;
use crate::service::{LeaderboardService, error_reply};
use crate::types::{DisplayDocument, MessageId};

/// Discord JSON error code for "Unknown Message".
const UNKNOWN_MESSAGE: isize = 10008;

pub const LEADERBOARD_COMMAND: &str = "leaderboard";
pub const SETMESSAGE_COMMAND: &str = "setmessage";
pub const USER_COMMAND: &str = "user";

/// The leaderboard channel, reached through the Discord REST API.
pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    timeout: Duration,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: u64, timeout: Duration) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
            timeout,
        }
    }
}

#[async_trait]
impl ChannelTransport for DiscordChannel {
    async fn send(&self, document: &DisplayDocument) -> Result<MessageId, TransportError> {
        let message = CreateMessage::new().embed(to_embed(document));
        match tokio::time::timeout(
            self.timeout,
            self.channel_id.send_message(&*self.http, message),
        )
        .await
        {
            Ok(Ok(sent)) => Ok(MessageId(sent.id.get())),
            Ok(Err(e)) => Err(TransportError::Rejected(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn delete(&self, id: MessageId) -> Result<(), DeleteError> {
        match tokio::time::timeout(
            self.timeout,
            self.channel_id
                .delete_message(&self.http, DiscordMessageId::new(id.0)),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if is_unknown_message(&e) => Err(DeleteError::NotFound),
            Ok(Err(e)) => Err(DeleteError::Other(e.to_string())),
            Err(_) => Err(DeleteError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn is_unknown_message(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            is_missing_message(resp.error.code, resp.status_code.as_u16())
        }
        _ => false,
    }
}

/// A delete failed because the message is gone, not because of permissions
/// or an outage.
fn is_missing_message(code: isize, status: u16) -> bool {
    code == UNKNOWN_MESSAGE || status == 404
}

/// Map a rendered document onto a Discord embed.
pub fn to_embed(document: &DisplayDocument) -> CreateEmbed {
    let mut footer = CreateEmbedFooter::new(&document.footer);
    if let Some(icon_url) = &document.footer_icon_url {
        footer = footer.icon_url(icon_url);
    }
    let timestamp = Timestamp::from_unix_timestamp(document.timestamp.timestamp())
        .unwrap_or_else(|_| Timestamp::now());

    let mut embed = CreateEmbed::new()
        .title(&document.title)
        .description(&document.description)
        .colour(document.colour)
        .timestamp(timestamp)
        .footer(footer);
    for field in &document.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    embed
}

/// Slash command schemas registered in every guild the bot joins.
pub fn command_definitions(default_start_date: NaiveDate) -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(LEADERBOARD_COMMAND)
            .description("Display the X.fun affiliate leaderboard")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "start_date",
                    format!(
                        "Start date for data (format: YYYY-MM-DD, default: {default_start_date})"
                    ),
                )
                .required(false),
            ),
        CreateCommand::new(SETMESSAGE_COMMAND)
            .description("Set a custom message to display above the leaderboard")
            .default_member_permissions(Permissions::MANAGE_MESSAGES)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "The message to display (leave empty to remove)",
                )
                .max_length(MAX_CUSTOM_MESSAGE_CHARS as u16)
                .required(false),
            ),
        CreateCommand::new(USER_COMMAND)
            .description("Get detailed information about a specific user")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "username",
                    "Username to look up",
                )
                .required(true),
            ),
    ]
}

/// Gateway event handler: registers commands, answers them, and starts the
/// channel refresh scheduler on the first `ready`.
pub struct Handler<S> {
    service: Arc<LeaderboardService<S, DiscordChannel>>,
    refresh_interval: Duration,
    publish_on_startup: bool,
    scheduler_started: AtomicBool,
}

impl<S> Handler<S>
where
    S: LeaderboardSource + 'static,
{
    pub fn new(
        service: Arc<LeaderboardService<S, DiscordChannel>>,
        refresh_interval: Duration,
        publish_on_startup: bool,
    ) -> Self {
        Self {
            service,
            refresh_interval,
            publish_on_startup,
            scheduler_started: AtomicBool::new(false),
        }
    }

    async fn dispatch(&self, ctx: &Context, command: &CommandInteraction) -> serenity::Result<()> {
        match command.data.name.as_str() {
            LEADERBOARD_COMMAND => {
                command.defer(ctx).await?;
                let start_date = string_option(command, "start_date");
                let response = match self.service.leaderboard_report(start_date).await {
                    Ok(document) => EditInteractionResponse::new().embed(to_embed(&document)),
                    Err(e) => {
                        warn!("/leaderboard failed: {e}");
                        EditInteractionResponse::new().content(error_reply(&e))
                    }
                };
                command.edit_response(ctx, response).await?;
            }
            SETMESSAGE_COMMAND => {
                let content = match self
                    .service
                    .set_custom_message(string_option(command, "message"))
                    .await
                {
                    Ok(confirmation) => confirmation.to_string(),
                    Err(e) => {
                        warn!("/setmessage rejected: {e}");
                        error_reply(&e)
                    }
                };
                let response = CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true);
                command
                    .create_response(ctx, CreateInteractionResponse::Message(response))
                    .await?;
            }
            USER_COMMAND => {
                command.defer(ctx).await?;
                let username = raw_string_option(command, "username").unwrap_or_default();
                let response = match self.service.lookup_user(username).await {
                    Ok(Some(document)) => EditInteractionResponse::new().embed(to_embed(&document)),
                    Ok(None) => EditInteractionResponse::new()
                        .content(format!("❌ User \"{username}\" not found.")),
                    Err(e) => {
                        warn!("/user failed: {e}");
                        EditInteractionResponse::new().content(error_reply(&e))
                    }
                };
                command.edit_response(ctx, response).await?;
            }
            other => debug!("Ignoring unknown command /{other}"),
        }
        Ok(())
    }
}

#[async_trait]
impl<S> EventHandler for Handler<S>
where
    S: LeaderboardSource + 'static,
{
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot has logged in as {}", ready.user.name);

        let commands = command_definitions(self.service.default_start_date());
        for guild in &ready.guilds {
            match guild.id.set_commands(&ctx.http, commands.clone()).await {
                Ok(registered) => {
                    info!("Registered {} command(s) in guild {}", registered.len(), guild.id)
                }
                Err(e) => error!("Failed to register commands in guild {}: {e}", guild.id),
            }
        }

        // `ready` fires again after a full reconnect; only one scheduler may run.
        if !self.scheduler_started.swap(true, Ordering::SeqCst) {
            tokio::spawn(
                self.service
                    .clone()
                    .run_scheduler(self.refresh_interval, self.publish_on_startup),
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        if let Err(e) = self.dispatch(&ctx, &command).await {
            error!("Failed to answer /{}: {e}", command.data.name);
        }
    }
}

/// Non-blank string option value.
fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    raw_string_option(command, name).filter(|value| !value.trim().is_empty())
}

/// String option value exactly as typed.
fn raw_string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    use crate::types::DisplayField;

    fn embed_json(embed: CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    #[test]
    fn missing_message_detection() {
        assert!(is_missing_message(10008, 404));
        assert!(is_missing_message(10008, 400));
        assert!(is_missing_message(0, 404));
        assert!(!is_missing_message(50013, 403));
        assert!(!is_missing_message(0, 500));
    }

    #[test]
    fn embed_carries_document() {
        let document = DisplayDocument {
            title: "🏆 X.fun Leaderboard - CHROME".to_string(),
            description: "desc".to_string(),
            fields: vec![DisplayField {
                name: "🥇 1. Alice".to_string(),
                value: "💰".to_string(),
                inline: false,
            }],
            colour: 0xFFD700,
            timestamp: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            footer: "Last Updated".to_string(),
            footer_icon_url: Some("https://cdn.discordapp.com/embed/avatars/0.png".to_string()),
        };
        let json = embed_json(to_embed(&document));
        assert_eq!(json["title"], "🏆 X.fun Leaderboard - CHROME");
        assert_eq!(json["description"], "desc");
        assert_eq!(json["color"], 0xFFD700);
        assert_eq!(json["footer"]["text"], "Last Updated");
        assert_eq!(json["fields"][0]["name"], "🥇 1. Alice");
        assert_eq!(json["fields"][0]["inline"], false);
    }

    #[test]
    fn command_schemas() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 24).unwrap();
        let commands: Vec<Value> = command_definitions(start)
            .into_iter()
            .map(|c| serde_json::to_value(c).unwrap())
            .collect();

        let names: Vec<&str> = commands.iter().map(|c| c["name"].as_str().unwrap()).collect();
        assert_eq!(names, [LEADERBOARD_COMMAND, SETMESSAGE_COMMAND, USER_COMMAND]);

        assert_eq!(commands[0]["options"][0]["name"], "start_date");
        assert!(!commands[0]["options"][0]["required"].as_bool().unwrap_or(false));
        assert!(
            commands[0]["options"][0]["description"]
                .as_str()
                .unwrap()
                .contains("2025-03-24")
        );
        assert_eq!(commands[1]["options"][0]["name"], "message");
        assert_eq!(commands[1]["options"][0]["max_length"], 3000);
        assert_eq!(commands[2]["options"][0]["name"], "username");
        assert!(commands[2]["options"][0]["required"].as_bool().unwrap_or(false));
    }
}
