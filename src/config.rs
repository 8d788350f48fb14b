use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DEFAULT_AFFILIATE_CODE, DEFAULT_START_DATE, XFUN_API_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
///
/// Secrets may instead come from the environment (see
/// [`AppConfig::apply_env_overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Discord bot credentials and target channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal.
    #[serde(default)]
    pub token: String,
    /// Channel that receives the scheduled leaderboard.
    #[serde(default)]
    pub channel_id: u64,
}

/// Affiliate API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Affiliate code passed as `?code=`.
    #[serde(default = "default_code")]
    pub code: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Seconds between scheduled channel refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Upper bound for every API and Discord call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Window start for the scheduled leaderboard and `/leaderboard` without arguments.
    #[serde(default = "default_start_date")]
    pub default_start_date: NaiveDate,
    /// Publish once right after connecting instead of waiting a full interval.
    #[serde(default)]
    pub publish_on_startup: bool,
}

fn default_base_url() -> String {
    XFUN_API_URL.to_string()
}

fn default_code() -> String {
    DEFAULT_AFFILIATE_CODE.to_string()
}

fn default_refresh_interval() -> u64 {
    30 * 60
}

fn default_request_timeout() -> u64 {
    15
}

fn default_start_date() -> NaiveDate {
    NaiveDate::parse_from_str(DEFAULT_START_DATE, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            code: default_code(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_request_timeout(),
            default_start_date: default_start_date(),
            publish_on_startup: false,
        }
    }
}

impl SettingsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Override file values with `DISCORD_TOKEN`, `CHANNEL_ID`,
    /// `XFUN_API_KEY`, `XFUN_API_URL` and `XFUN_CODE` when set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(channel) = var("CHANNEL_ID") {
            self.discord.channel_id = channel
                .trim()
                .parse()
                .with_context(|| format!("CHANNEL_ID must be a numeric id, got {channel:?}"))?;
        }
        if let Some(key) = var("XFUN_API_KEY") {
            self.api.api_key = key;
        }
        if let Some(url) = var("XFUN_API_URL") {
            self.api.base_url = url;
        }
        if let Some(code) = var("XFUN_CODE") {
            self.api.code = code;
        }
        Ok(())
    }

    /// Check the settings needed to run; Discord credentials are only
    /// required when `require_discord` is set.
    pub fn validate(&self, require_discord: bool) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            bail!("API key missing: set [api].api_key or XFUN_API_KEY");
        }
        let url = Url::parse(&self.api.base_url)
            .with_context(|| format!("invalid API base URL {:?}", self.api.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("API base URL must be http(s), got {}", url.scheme());
        }
        if self.api.code.trim().is_empty() {
            bail!("affiliate code must not be empty");
        }
        if self.settings.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be positive");
        }
        if self.settings.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if require_discord {
            if self.discord.token.trim().is_empty() {
                bail!("Discord token missing: set [discord].token or DISCORD_TOKEN");
            }
            if self.discord.channel_id == 0 {
                bail!("Discord channel missing: set [discord].channel_id or CHANNEL_ID");
            }
        }
        Ok(())
    }
}
