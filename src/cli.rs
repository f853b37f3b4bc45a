// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands, one per kind of scan target:
//
//   video-link-guardian channel @creator --count 50
//   video-link-guardian videos https://youtu.be/dQw4w9WgXcQ https://...
//
// Both share the same output, plan, and API options (ScanArgs), pulled in
// with #[command(flatten)] so they're declared once.
// =============================================================================

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::scan::PlanLimit;

#[derive(Parser, Debug)]
#[command(
    name = "video-link-guardian",
    version = "0.1.0",
    about = "Scan video descriptions for broken links",
    long_about = "video-link-guardian collects a channel's videos (or an explicit list), \
                  extracts every link from their descriptions, and reports which links \
                  are working, suspicious, or broken. Exits with code 1 when broken \
                  links are found, so it slots into scheduled jobs and CI."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the most recent uploads of a channel
    ///
    /// Example: video-link-guardian channel @creator --count 25
    Channel {
        /// Channel id (UC...), @handle, or channel URL
        channel: String,

        #[command(flatten)]
        opts: ScanArgs,
    },

    /// Scan an explicit list of videos
    ///
    /// Example: video-link-guardian videos https://youtu.be/dQw4w9WgXcQ
    Videos {
        /// Video URLs or bare video ids
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        opts: ScanArgs,
    },
}

/// Options shared by every scan.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// How many videos to scan (channel scans only)
    #[arg(long, default_value_t = 50)]
    pub count: usize,

    /// Max videos the plan allows per scan: a number or "unlimited"
    #[arg(long, default_value_t = PlanLimit::Unlimited)]
    pub plan_limit: PlanLimit,

    /// Only videos published on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Only videos published on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON result to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Links probed at once (overrides the config file)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// API key; repeat the flag or comma-separate to pool several keys
    #[arg(long = "api-key", env = "YOUTUBE_API_KEYS", value_delimiter = ',', hide_env_values = true)]
    pub api_keys: Vec<String>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Commands {
    pub fn opts(&self) -> &ScanArgs {
        match self {
            Commands::Channel { opts, .. } | Commands::Videos { opts, .. } => opts,
        }
    }
}
