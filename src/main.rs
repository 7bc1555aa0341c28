use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use storepulse::db::Db;
use storepulse::shop::ShopClient;
use storepulse::sync::alerts::{LogNotifier, Notifier, WebhookNotifier};
use storepulse::sync::{run_sync, SyncConfig};
use storepulse::util::env as env_util;
use tracing::{error, info};

/// Store sync runner: one-shot by default, or a periodic loop.
#[derive(Debug, Parser)]
#[command(name = "storepulse")]
struct Args {
    /// Run a single sync and exit, even if an interval is configured.
    #[arg(long)]
    once: bool,
    /// Sync every N seconds (overrides SYNC_INTERVAL_SECS).
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[derive(Debug, Default)]
struct LoopMetrics {
    runs: u64,
    failures: u64,
    last_run_ms: u64,
    last_error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    env_util::preflight_check(
        "sync-runner",
        &["SHOP_DOMAIN", "SHOP_API_TOKEN"],
        &[
            "DATABASE_URL",
            "SHOP_DOMAIN",
            "SYNC_ORDER_WINDOW_DAYS",
            "SYNC_INTERVAL_SECS",
            "ALERT_WEBHOOK_URL",
        ],
    )?;

    let database_url = env_util::db_url()?;
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_conns)
        .await
        .context("Db::connect failed")?;

    let shop = ShopClient::from_env()?;
    let notifier: Arc<dyn Notifier> = match WebhookNotifier::from_env()? {
        Some(webhook) => Arc::new(webhook),
        None => Arc::new(LogNotifier),
    };
    let config = SyncConfig::from_env();

    let interval_secs = args
        .interval_secs
        .or_else(|| env_util::env_opt("SYNC_INTERVAL_SECS").and_then(|v| v.parse().ok()));
    let interval = match (args.once, interval_secs) {
        (false, Some(secs)) if secs > 0 => Some(secs),
        _ => None,
    };

    let Some(secs) = interval else {
        let summary = run_sync(&shop, &db, notifier.as_ref(), &config).await?;
        info!(%summary, "sync complete");
        println!("{summary}");
        return Ok(());
    };

    // drift-free interval; immediate first tick
    let mut metrics = LoopMetrics::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        info!("sync: tick");
        let t_run = std::time::Instant::now();
        match run_sync(&shop, &db, notifier.as_ref(), &config).await {
            Ok(summary) => {
                metrics.runs += 1;
                metrics.last_run_ms = t_run.elapsed().as_millis() as u64;
                info!(
                    elapsed_ms = %metrics.last_run_ms,
                    total_runs = %metrics.runs,
                    failures = %metrics.failures,
                    %summary,
                    "sync: tick complete"
                );
            }
            Err(e) => {
                error!(error = %e, "sync run failed");
                metrics.failures += 1;
                metrics.last_error = Some(e.to_string());
            }
        }
    }
}
