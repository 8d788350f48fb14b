use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::all::{Client, GatewayIntents};
use serenity::http::Http;
use tracing::{info, warn};

use xfun_leaderboard::api::{LeaderboardSource, XfunClient};
use xfun_leaderboard::config::{AppConfig, CONFIG_PATH};
use xfun_leaderboard::discord::{DiscordChannel, Handler};
use xfun_leaderboard::publisher::ChannelTransport;
use xfun_leaderboard::reporter::StdoutChannel;
use xfun_leaderboard::service::LeaderboardService;

#[derive(Parser)]
#[command(name = "leaderboard-bot", about = "X.fun affiliate leaderboard Discord bot")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Publish a single leaderboard and exit
    #[arg(long)]
    once: bool,

    /// Print leaderboards to stdout as JSON instead of posting to Discord
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Failed to load .env: {e}");
        }
    }

    let mut config = AppConfig::load_or_default(&args.config)?;
    config.apply_env_overrides()?;
    config.validate(!args.dry_run)?;
    info!("Loaded config from {}", args.config.display());

    let settings = &config.settings;
    let source = XfunClient::new(
        &config.api.base_url,
        &config.api.api_key,
        &config.api.code,
        settings.request_timeout(),
    )
    .context("failed to build API client")?;

    let mode = if args.dry_run { "dry-run" } else { "live" };
    info!(
        "Starting leaderboard bot ({mode}) — code={} since={} refresh={}s timeout={}s",
        config.api.code,
        settings.default_start_date,
        settings.refresh_interval_secs,
        settings.request_timeout_secs,
    );

    if args.dry_run {
        let service = LeaderboardService::new(
            source,
            StdoutChannel::default(),
            &config.api.code,
            settings.default_start_date,
        );
        return run_without_gateway(Arc::new(service), &config, args.once).await;
    }

    let http = Arc::new(Http::new(&config.discord.token));
    let channel = DiscordChannel::new(http, config.discord.channel_id, settings.request_timeout());
    let service = Arc::new(LeaderboardService::new(
        source,
        channel,
        &config.api.code,
        settings.default_start_date,
    ));

    if args.once {
        return run_without_gateway(service, &config, true).await;
    }

    let handler = Handler::new(
        service,
        settings.refresh_interval(),
        settings.publish_on_startup,
    );
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES;
    let mut client = Client::builder(&config.discord.token, intents)
        .event_handler(handler)
        .await
        .context("failed to create Discord client")?;
    let shard_manager = client.shard_manager.clone();

    info!("Connecting to Discord gateway. Press Ctrl+C to stop.");
    tokio::select! {
        result = client.start() => {
            result.context("Discord client stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}

/// Publish through `service` without a gateway connection: once, or on the
/// scheduler until Ctrl+C.
async fn run_without_gateway<S, T>(
    service: Arc<LeaderboardService<S, T>>,
    config: &AppConfig,
    once: bool,
) -> Result<()>
where
    S: LeaderboardSource + 'static,
    T: ChannelTransport + 'static,
{
    if once {
        let id = service
            .refresh_channel()
            .await
            .context("leaderboard refresh failed")?;
        info!("Published leaderboard (message {id})");
        return Ok(());
    }

    let scheduler = tokio::spawn(service.run_scheduler(
        config.settings.refresh_interval(),
        config.settings.publish_on_startup,
    ));
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.abort();
    Ok(())
}
