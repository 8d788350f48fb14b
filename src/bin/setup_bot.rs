//! setup-bot — First-time setup for the leaderboard bot.
//!
//! Loads `config.toml` (or starts from defaults if it does not exist yet),
//! reads the Discord bot token and X.fun API key, checks the API key with a
//! live request, and writes the result back to the config file.
//!
//! By default, secrets are read interactively (hidden input) to avoid
//! leaking them into shell history. Use the flags only for scripted/CI use.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use xfun_leaderboard::api::{LeaderboardSource, XfunClient};
use xfun_leaderboard::config::{AppConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(
    name = "setup-bot",
    about = "Validate the API key and save bot credentials to config.toml"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Discord bot token. If omitted, reads interactively with hidden input.
    #[arg(long)]
    discord_token: Option<String>,

    /// X.fun API key. If omitted, reads interactively with hidden input.
    #[arg(long)]
    api_key: Option<String>,

    /// Channel that receives the scheduled leaderboard
    #[arg(long)]
    channel_id: Option<u64>,
}

fn read_secret(flag: Option<String>, prompt: &str) -> Result<String> {
    let value = match flag {
        Some(v) => v,
        None => rpassword::prompt_password(prompt).context("failed to read input")?,
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("value cannot be empty");
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut app_config = AppConfig::load_or_default(&cli.config)?;

    println!("=== X.fun Leaderboard Bot — Setup ===\n");

    // ── Step 1: Read secrets ───────────────────────────────────────
    let discord_token = read_secret(cli.discord_token, "Enter Discord bot token: ")
        .context("Discord token")?;
    let api_key = read_secret(cli.api_key, "Enter X.fun API key: ").context("API key")?;

    // ── Step 2: Verify API key ─────────────────────────────────────
    println!("Checking API key against {}...", app_config.api.base_url);
    let client = XfunClient::new(
        &app_config.api.base_url,
        &api_key,
        &app_config.api.code,
        app_config.settings.request_timeout(),
    )?;
    let records = client
        .fetch()
        .await
        .context("API key check failed — leaderboard request was rejected")?;
    println!(
        "  OK: {} record(s) for code {}",
        records.len(),
        app_config.api.code
    );
    println!();

    // ── Step 3: Save ───────────────────────────────────────────────
    app_config.discord.token = discord_token;
    app_config.api.api_key = api_key;
    if let Some(channel_id) = cli.channel_id {
        app_config.discord.channel_id = channel_id;
    }
    if app_config.discord.channel_id == 0 {
        println!(
            "Note: no channel id set yet; pass --channel-id or set CHANNEL_ID before running the bot."
        );
    }

    app_config.save(&cli.config)?;
    println!("Saved credentials to {}", cli.config.display());
    Ok(())
}
