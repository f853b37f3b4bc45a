// src/scan/result.rs
// =============================================================================
// What a scan hands back: per-video link results plus aggregate counts.
//
// Serialized with camelCase field names so the JSON matches what the web
// layer and storage already expect.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checker::{LinkProbeResult, LinkStatus};

/// Links found in one video and how each one fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoScanResult {
    pub video_id: String,
    pub video_title: String,
    pub video_url: String,
    pub links: Vec<LinkProbeResult>,
}

/// Categorical link counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatistics {
    pub total_links: usize,
    pub broken_links: usize,
    pub warning_links: usize,
    pub working_links: usize,
}

impl ScanStatistics {
    /// Counts every link of every video.
    pub fn from_results(results: &[VideoScanResult]) -> Self {
        results
            .iter()
            .flat_map(|video| &video.links)
            .fold(Self::default(), |mut stats, link| {
                stats.total_links += 1;
                match link.status {
                    LinkStatus::Working => stats.working_links += 1,
                    LinkStatus::Warning => stats.warning_links += 1,
                    LinkStatus::Broken => stats.broken_links += 1,
                }
                stats
            })
    }
}

/// The complete outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Videos collected in the first phase
    pub scanned_videos: usize,
    /// Videos whose description had at least one link
    pub videos_with_links: usize,
    pub statistics: ScanStatistics,
    pub results: Vec<VideoScanResult>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn has_broken_links(&self) -> bool {
        self.statistics.broken_links > 0
    }
}
