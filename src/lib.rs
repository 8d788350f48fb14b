pub mod api;
pub mod config;
pub mod discord;
pub mod engine;
pub mod error;
pub mod publisher;
pub mod reporter;
pub mod service;
pub mod state;
pub mod types;

/// X.fun affiliate API endpoint (requires `X-Apikey` header)
pub const XFUN_API_URL: &str = "https://api.x.fun/api/affiliate/external";

/// Affiliate code whose referrals make up the leaderboard
pub const DEFAULT_AFFILIATE_CODE: &str = "CHROME";

/// Window start used when no date is configured or passed to `/leaderboard`
pub const DEFAULT_START_DATE: &str = "2025-03-24";

/// Number of ranked players shown in the leaderboard
pub const TOP_PLAYERS: usize = 10;
