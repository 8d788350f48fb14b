//! Probe: X.fun affiliate endpoint
//!
//! Hits GET <base>?code=<code> once with the configured API key and documents:
//! - Status and latency
//! - Response shape and record fields
//! - How many records the aggregator would drop for unparseable createdAt

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde_json::Value;

use xfun_leaderboard::api::parse_leaderboard_body;
use xfun_leaderboard::config::{AppConfig, CONFIG_PATH};
use xfun_leaderboard::engine::{aggregate, parse_created_at};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::load_or_default(Path::new(CONFIG_PATH))?;
    config.apply_env_overrides()?;
    config.validate(false)?;

    let client = reqwest::Client::builder()
        .timeout(config.settings.request_timeout())
        .build()?;

    println!("=== Probe: X.fun affiliate API ===");
    println!("URL:  {}?code={}", config.api.base_url, config.api.code);
    println!();

    // 1. Single request
    println!("--- 1. Fetch ---");
    let start = Instant::now();
    let resp = client
        .get(&config.api.base_url)
        .query(&[("code", config.api.code.as_str())])
        .header("X-Apikey", &config.api.api_key)
        .header("Content-Type", "application/json")
        .send()
        .await?;
    let latency = start.elapsed();
    let status = resp.status();
    let body = resp.text().await?;
    println!("Status: {}", status);
    println!("Latency: {:?}", latency);
    println!("Body size: {} bytes", body.len());
    println!();

    if !status.is_success() {
        println!("Error body:");
        println!("{body}");
        return Ok(());
    }

    // 2. Raw shape
    println!("--- 2. Response shape ---");
    let raw: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            println!("Body is not JSON: {e}");
            return Ok(());
        }
    };
    if let Some(obj) = raw.as_object() {
        println!("Top-level keys:");
        for key in obj.keys() {
            println!("  - {}", key);
        }
    }
    let data = raw.get("data").and_then(|d| d.as_array());
    match data {
        Some(arr) => {
            println!("Record count: {}", arr.len());
            if let Some(first) = arr.first() {
                println!("\nSample record (first):");
                println!("{}", serde_json::to_string_pretty(first)?);
            }
            let fields: BTreeSet<&str> = arr
                .iter()
                .filter_map(|r| r.as_object())
                .flat_map(|o| o.keys().map(|k| k.as_str()))
                .collect();
            println!("\nFields present across records:");
            for field in fields {
                println!("  - {}", field);
            }
        }
        None => println!("No `data` array in response"),
    }
    println!();

    // 3. Decoded view
    println!("--- 3. Decoded records ---");
    let records = match parse_leaderboard_body(&body) {
        Ok(r) => r,
        Err(e) => {
            println!("Decoder rejected body: {e}");
            return Ok(());
        }
    };
    let unparseable: Vec<&str> = records
        .iter()
        .filter_map(|r| match r.created_at.as_deref() {
            Some(raw) if parse_created_at(raw).is_some() => None,
            Some(raw) => Some(raw),
            None => Some("<missing>"),
        })
        .collect();
    println!("  Decoded: {}", records.len());
    println!("  Unparseable createdAt: {}", unparseable.len());
    for raw in unparseable.iter().take(5) {
        println!("    e.g. {raw:?}");
    }

    match aggregate(&records, config.settings.default_start_date) {
        Ok(result) => println!(
            "  Since {}: {} players, ${} wagered, ${} deposited",
            result.window_start, result.player_count, result.total_wagered, result.total_deposited
        ),
        Err(e) => println!("  Aggregation failed: {e}"),
    }
    println!();

    println!("=== Probe Complete ===");
    Ok(())
}
