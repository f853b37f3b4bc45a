// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments and load the optional config file
// 2. Build the scan engine: credential pool -> API client -> discovery,
//    plus the link checker, all handed to the orchestrator
// 3. Run one scan, with Ctrl-C wired to cancellation
// 4. Print the result and exit with a code scripts can act on:
//      0 = no broken links
//      1 = broken links found
//      2 = error
//      3 = every API key is out of quota
//
// Logs (progress, retries, quota rotation) go to stderr through `tracing`,
// so stdout stays clean for --json.
// =============================================================================

mod checker; // src/checker/ - link extraction and probing
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - optional TOML config
mod error; // src/error.rs - typed engine errors
mod scan; // src/scan/ - the three-phase scan pipeline
mod youtube; // src/youtube/ - quota-managed metadata API access

#[cfg(test)]
mod testing;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use checker::{LinkHealthChecker, LinkProbeResult, LinkStatus};
use cli::{Cli, Commands, ScanArgs};
use config::AppConfig;
use error::ScanError;
use scan::{ScanControl, ScanOrchestrator, ScanProgress, ScanRequest, ScanResult};
use youtube::{ChannelVideoDiscovery, CredentialPool, QuotaManagedApiClient, ReqwestTransport};

const EXIT_OK: i32 = 0;
const EXIT_BROKEN_LINKS: i32 = 1;
const EXIT_ERROR: i32 = 2;
const EXIT_QUOTA_EXHAUSTED: i32 = 3;

// Metadata API calls are small JSON documents
const API_TIMEOUT: Duration = Duration::from_secs(30);

// YouTube's quota day starts at midnight Pacific. Standard time, so under
// daylight saving the reset lands an hour late, never early.
const QUOTA_DAY_OFFSET_SECS: i64 = 8 * 3600;
const SECS_PER_DAY: i64 = 86_400;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let opts = cli.command.opts().clone();

    init_tracing(opts.verbose);

    let config = resolve_config(&opts)?;
    let (orchestrator, pool) = build_orchestrator(&config)?;
    spawn_quota_rollover(Arc::clone(&pool));

    let request = match cli.command {
        Commands::Channel { channel, opts } => {
            ScanRequest::channel(channel, opts.count, opts.plan_limit)
        }
        Commands::Videos { urls, opts } => ScanRequest::videos(urls, opts.plan_limit),
    }
    .with_date_range(opts.start_date, opts.end_date);

    let control = spawn_control();

    let outcome = orchestrator.scan_with(&request, &control).await;

    for credential in pool.snapshot() {
        tracing::info!(
            credential = %credential.id,
            used = credential.quota_used,
            limit = credential.quota_limit,
            exhausted = credential.exhausted,
            "quota usage"
        );
    }
    if pool.all_exhausted() {
        tracing::warn!("every API key is out of quota until the next daily reset");
    }

    match outcome {
        Ok(result) => {
            print_results(&result, opts.json)?;
            if let Some(path) = &opts.output {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(path, json)
                    .with_context(|| format!("write results to {}", path.display()))?;
                tracing::info!(path = %path.display(), "results written");
            }

            if result.has_broken_links() {
                Ok(EXIT_BROKEN_LINKS)
            } else {
                Ok(EXIT_OK)
            }
        }
        Err(ScanError::QuotaExhausted) => {
            eprintln!("Error: {}", ScanError::QuotaExhausted);
            eprintln!("   Every API key has used up its daily quota. Add keys or wait for the reset.");
            Ok(EXIT_QUOTA_EXHAUSTED)
        }
        Err(e) => Err(e.into()),
    }
}

// stderr, info by default, debug with --verbose, RUST_LOG overrides both
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// File values first, then command-line overrides. Fails before any network
// work if no API key is available.
fn resolve_config(opts: &ScanArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load(opts.config.as_deref())?;

    if !opts.api_keys.is_empty() {
        config.api.keys = opts.api_keys.clone();
    }
    if let Some(concurrency) = opts.concurrency {
        config.scan.concurrency = concurrency;
    }

    config.api.keys = config
        .api
        .keys
        .iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();

    if config.api.keys.is_empty() {
        bail!(
            "no API keys configured: pass --api-key, set YOUTUBE_API_KEYS, \
             or add `keys` under [api] in the config file"
        );
    }

    Ok(config)
}

// Returns the pool alongside so quota usage can be reported afterwards.
fn build_orchestrator(config: &AppConfig) -> Result<(ScanOrchestrator, Arc<CredentialPool>)> {
    let pool = Arc::new(CredentialPool::from_keys(
        config.api.keys.iter().cloned(),
        config.api.quota_limit_per_key,
    ));
    tracing::debug!(credentials = pool.len(), "credential pool ready");

    let http = reqwest::Client::builder()
        .timeout(API_TIMEOUT)
        .build()
        .context("build API HTTP client")?;
    let transport = Arc::new(ReqwestTransport::new(http, config.api.base_url.clone()));
    let client = QuotaManagedApiClient::new(transport, Arc::clone(&pool))
        .with_retry_delay(config.api.transport_retry_delay());

    let discovery = ChannelVideoDiscovery::new(client);
    let checker = LinkHealthChecker::with_reqwest(config.probe.clone())?;

    let orchestrator =
        ScanOrchestrator::new(discovery, checker).with_concurrency(config.scan.concurrency);
    Ok((orchestrator, pool))
}

// Puts every credential back to Active when the quota day rolls over, so a
// scan running across midnight Pacific picks its keys back up.
fn spawn_quota_rollover(pool: Arc<CredentialPool>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(until_next_quota_day(Utc::now())).await;
            pool.reset_all();
            tracing::info!("quota day rolled over, credentials reset");
        }
    });
}

fn until_next_quota_day(now: DateTime<Utc>) -> Duration {
    let into_day = (now.timestamp() - QUOTA_DAY_OFFSET_SECS).rem_euclid(SECS_PER_DAY);
    Duration::from_secs((SECS_PER_DAY - into_day) as u64)
}

// Ctrl-C cancels the scan; progress events become log lines.
fn spawn_control() -> ScanControl {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let control = ScanControl {
        progress: Some(tx),
        ..ScanControl::default()
    };

    let cancel = control.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping scan");
            cancel.cancel();
        }
    });

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ScanProgress::Collected { videos } => {
                    tracing::info!("📄 Collected {} video(s)", videos);
                }
                ScanProgress::Extracted {
                    videos_with_links,
                    links,
                } => {
                    tracing::info!(
                        "🌐 Checking {} link(s) across {} video(s)",
                        links,
                        videos_with_links
                    );
                }
                ScanProgress::VideoChecked {
                    video_id,
                    checked,
                    total,
                } => {
                    tracing::info!("   [{}/{}] {}", checked, total, video_id);
                }
            }
        }
    });

    control
}

// Prints the results either as a table or JSON
fn print_results(result: &ScanResult, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(result)?;
        println!("{}", json_output);
    } else {
        print_table(result);
    }
    Ok(())
}

// Prints results as a human-readable table, one block per video
fn print_table(result: &ScanResult) {
    if result.results.is_empty() {
        println!("✅ No links found to check");
    }

    for video in &result.results {
        let broken = video.links.iter().filter(|link| link.is_broken()).count();
        if broken > 0 {
            println!("🎬 {} ({}) - ❌ {} broken", video.video_title, video.video_url, broken);
        } else {
            println!("🎬 {} ({})", video.video_title, video.video_url);
        }
        println!("{:<70} {:<12} {:<6}", "URL", "STATUS", "CODE");
        println!("{}", "=".repeat(90));

        for link in &video.links {
            print_link(link);
        }
        println!();
    }

    let stats = &result.statistics;
    println!("📊 Summary:");
    println!("   🎬 Videos scanned: {}", result.scanned_videos);
    println!("   🔗 Videos with links: {}", result.videos_with_links);
    println!("   ✅ Working: {}", stats.working_links);
    println!("   ⚠️  Warning: {}", stats.warning_links);
    println!("   ❌ Broken: {}", stats.broken_links);
    println!("   📋 Total: {}", stats.total_links);
}

fn print_link(link: &LinkProbeResult) {
    // Truncate on a char boundary so long non-ASCII URLs don't panic
    let url_display = if link.url.chars().count() > 67 {
        let head: String = link.url.chars().take(67).collect();
        format!("{}...", head)
    } else {
        link.url.clone()
    };
    let code = if link.http_status_code == 0 {
        "-".to_string()
    } else {
        link.http_status_code.to_string()
    };

    println!("{:<70} {:<12} {:<6}", url_display, format_status(link.status), code);
}

fn format_status(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Working => "✅ WORKING",
        LinkStatus::Warning => "⚠️  WARNING",
        LinkStatus::Broken => "❌ BROKEN",
    }
}
