// src/scan/orchestrator.rs
// =============================================================================
// Runs one scan end to end.
//
// Phases, strictly in order:
// 1. Collect: discover the channel's videos (or parse the explicit list),
//    capped at min(requested, plan limit)
// 2. Extract: fetch each video's description and pull out its links; videos
//    with no links are dropped
// 3. Check: probe every link of every remaining video
//
// Failure rules:
// - Phase 1 errors and quota exhaustion anywhere abort the scan
// - A video whose details can't be fetched is skipped
// - A link whose probe blows up is recorded as broken with code 0
//
// Cancellation is checked between videos and between probes, and an
// in-flight probe is abandoned as soon as the token fires.
// =============================================================================

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::checker::{extract_video_links, ExtractedLink, LinkHealthChecker, LinkProbeResult};
use crate::error::{ApiError, ScanError};
use crate::youtube::{parse_video_id, ChannelRef, ChannelVideoDiscovery, DateRange, VideoRef};

use super::request::{PlanLimit, ScanRequest, ScanTarget};
use super::result::{ScanResult, ScanStatistics, VideoScanResult};

/// Milestones reported while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    /// Phase 1 finished
    Collected { videos: usize },
    /// Phase 2 finished
    Extracted { videos_with_links: usize, links: usize },
    /// One video's links are all probed
    VideoChecked {
        video_id: String,
        checked: usize,
        total: usize,
    },
}

/// Per-run controls: a cancellation token and an optional progress channel.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    pub cancel: CancellationToken,
    pub progress: Option<UnboundedSender<ScanProgress>>,
}

impl ScanControl {
    fn report(&self, event: ScanProgress) {
        if let Some(progress) = &self.progress {
            // Nobody listening is fine
            let _ = progress.send(event);
        }
    }

    fn check_cancelled(&self) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// A video that made it through phase 2.
#[derive(Debug)]
struct ExtractedVideo {
    video: VideoRef,
    links: Vec<ExtractedLink>,
}

// Request-scoped bookkeeping for one invocation.
#[derive(Debug)]
struct ScanJob {
    requested_count: usize,
    enforced_count: usize,
    videos: Vec<VideoRef>,
    results: Vec<VideoScanResult>,
}

impl ScanJob {
    fn finish(self) -> ScanResult {
        debug_assert!(self.enforced_count <= self.requested_count);
        debug_assert!(self.videos.len() <= self.enforced_count);

        ScanResult {
            scanned_videos: self.videos.len(),
            videos_with_links: self.results.len(),
            statistics: ScanStatistics::from_results(&self.results),
            results: self.results,
            scanned_at: Utc::now(),
        }
    }
}

/// Composes discovery, extraction and checking into one scan.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    discovery: ChannelVideoDiscovery,
    checker: LinkHealthChecker,
    concurrency: usize,
}

impl ScanOrchestrator {
    pub fn new(discovery: ChannelVideoDiscovery, checker: LinkHealthChecker) -> Self {
        Self {
            discovery,
            checker,
            concurrency: 1,
        }
    }

    /// How many probes of one video may be in flight at once. 1 keeps the
    /// sequential behaviour; higher is faster but looks more like abusive
    /// traffic to the fragile hosts.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs a scan with no cancellation or progress reporting.
    #[cfg(test)]
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResult, ScanError> {
        self.scan_with(request, &ScanControl::default()).await
    }

    #[instrument(skip(self, request, control), fields(target = ?request.target))]
    pub async fn scan_with(
        &self,
        request: &ScanRequest,
        control: &ScanControl,
    ) -> Result<ScanResult, ScanError> {
        if let PlanLimit::Limited(0) = request.plan_limit {
            return Err(ScanError::PlanLimitExceeded {
                requested: request.requested_count,
                limit: 0,
            });
        }

        let mut job = ScanJob {
            requested_count: request.requested_count,
            enforced_count: request.enforced_count(),
            videos: Vec::new(),
            results: Vec::new(),
        };

        control.check_cancelled()?;
        job.videos = self.collect(request, job.enforced_count, control).await?;
        tracing::info!(
            requested = job.requested_count,
            enforced = job.enforced_count,
            collected = job.videos.len(),
            "collected videos"
        );
        control.report(ScanProgress::Collected {
            videos: job.videos.len(),
        });

        let extracted = self.extract(&job.videos, control).await?;
        let link_count: usize = extracted.iter().map(|v| v.links.len()).sum();
        tracing::info!(videos_with_links = extracted.len(), links = link_count, "extracted links");
        control.report(ScanProgress::Extracted {
            videos_with_links: extracted.len(),
            links: link_count,
        });

        let total = extracted.len();
        for (index, ExtractedVideo { video, links }) in extracted.into_iter().enumerate() {
            control.check_cancelled()?;

            let probed = self.check_links(&links, control).await?;
            tracing::debug!(video_id = %video.external_id, links = probed.len(), "checked video");

            control.report(ScanProgress::VideoChecked {
                video_id: video.external_id.clone(),
                checked: index + 1,
                total,
            });
            job.results.push(VideoScanResult {
                video_id: video.external_id,
                video_title: video.title,
                video_url: video.url,
                links: probed,
            });
        }

        let result = job.finish();
        tracing::info!(
            total = result.statistics.total_links,
            working = result.statistics.working_links,
            warning = result.statistics.warning_links,
            broken = result.statistics.broken_links,
            "scan complete"
        );
        Ok(result)
    }

    // Phase 1
    async fn collect(
        &self,
        request: &ScanRequest,
        enforced_count: usize,
        control: &ScanControl,
    ) -> Result<Vec<VideoRef>, ScanError> {
        if enforced_count == 0 {
            return Ok(Vec::new());
        }

        match &request.target {
            ScanTarget::Channel(channel) => {
                let channel = ChannelRef::parse(channel);
                let listing = self.discover(&channel, enforced_count, request.date_range());

                tokio::select! {
                    _ = control.cancel.cancelled() => Err(ScanError::Cancelled),
                    videos = listing => Ok(videos?),
                }
            }
            ScanTarget::Videos(urls) => Ok(urls
                .iter()
                .filter_map(|url| match parse_video_id(url) {
                    Some(video_id) => Some(VideoRef::from_id(video_id)),
                    None => {
                        tracing::warn!(%url, "not a recognisable video URL, skipping");
                        None
                    }
                })
                .take(enforced_count)
                .collect()),
        }
    }

    async fn discover(
        &self,
        channel: &ChannelRef,
        enforced_count: usize,
        range: DateRange,
    ) -> Result<Vec<VideoRef>, ApiError> {
        let feed_id = self.discovery.resolve_uploads_feed(channel).await?;
        self.discovery.list_videos(&feed_id, enforced_count, range).await
    }

    // Phase 2
    async fn extract(
        &self,
        videos: &[VideoRef],
        control: &ScanControl,
    ) -> Result<Vec<ExtractedVideo>, ScanError> {
        let mut extracted = Vec::new();

        for video in videos {
            control.check_cancelled()?;

            let details = tokio::select! {
                _ = control.cancel.cancelled() => return Err(ScanError::Cancelled),
                details = self.discovery.video_details(&video.external_id) => details,
            };

            let details = match details {
                Ok(details) => details,
                Err(err) if err.is_quota_exhausted() => return Err(ScanError::QuotaExhausted),
                Err(err) => {
                    tracing::warn!(video_id = %video.external_id, error = %err, "skipping video");
                    continue;
                }
            };

            let links = extract_video_links(&video.external_id, &details.description);
            if links.is_empty() {
                continue;
            }

            // Explicit-list videos only learn their title here
            let mut video = video.clone();
            if !details.title.is_empty() {
                video.title = details.title;
            }
            if video.published_at.is_none() {
                video.published_at = details.published_at;
            }

            extracted.push(ExtractedVideo { video, links });
        }

        Ok(extracted)
    }

    // Phase 3, for one video. Results keep extraction order even when
    // several probes run at once.
    async fn check_links(
        &self,
        links: &[ExtractedLink],
        control: &ScanControl,
    ) -> Result<Vec<LinkProbeResult>, ScanError> {
        let probes = links.iter().map(|link| {
            let checker = self.checker.clone();
            let url = link.raw_url.clone();
            let video_id = link.source_video_id.clone();
            let cancel = control.cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }

                // Own task, so a panic inside one probe only costs that link
                let mut handle = tokio::spawn({
                    let url = url.clone();
                    async move { checker.probe(&url).await }
                });

                tokio::select! {
                    _ = cancel.cancelled() => {
                        handle.abort();
                        None
                    }
                    joined = &mut handle => Some(match joined {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::warn!(%video_id, %url, error = %err, "link check failed, recording as broken");
                            LinkProbeResult::failed(url)
                        }
                    }),
                }
            }
        });

        let results: Vec<Option<LinkProbeResult>> = stream::iter(probes)
            .buffered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(ScanError::Cancelled)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. buffered vs buffer_unordered
//    - Both run up to N futures at once
//    - buffered(N) yields results in the order the futures were created,
//      which is what keeps links in description order here
//
// 2. What does tokio::select! do?
//    - Waits on several futures and runs the branch of whichever finishes
//      first; the others are dropped
//    - We race every long wait against cancel.cancelled()
//
// 3. Why collect::<Option<Vec<_>>>()?
//    - Collecting an iterator of Options into Option<Vec> gives None if any
//      element was None, i.e. if any probe was cancelled
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{LinkStatus, ProbePolicy, ProbeTransport};
    use crate::testing::{FakeProbe, FakeYouTube, PanickingTransport, StallingTransport};
    use crate::youtube::{CredentialPool, Endpoint, QuotaManagedApiClient};
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator(
        api: Arc<FakeYouTube>,
        transport: Arc<dyn ProbeTransport>,
        quota: u64,
    ) -> ScanOrchestrator {
        let pool = Arc::new(CredentialPool::from_keys(["k1"], quota));
        let client = QuotaManagedApiClient::new(api, pool).with_retry_delay(Duration::ZERO);
        let policy = ProbePolicy {
            retry_delay_secs: 0,
            ..ProbePolicy::default()
        };
        ScanOrchestrator::new(
            ChannelVideoDiscovery::new(client),
            LinkHealthChecker::new(transport, policy),
        )
    }

    fn assert_consistent(result: &ScanResult) {
        let stats = result.statistics;
        let listed: usize = result.results.iter().map(|v| v.links.len()).sum();
        assert_eq!(stats.total_links, listed);
        assert_eq!(
            stats.working_links + stats.warning_links + stats.broken_links,
            stats.total_links
        );
        assert_eq!(result.videos_with_links, result.results.len());
        assert!(result.results.iter().all(|v| !v.links.is_empty()));
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let api = Arc::new(
            FakeYouTube::new()
                .with_video(
                    "2024-03-01T00:00:00Z",
                    "Gear: https://example.com/gone. Follow https://www.instagram.com/creator",
                )
                .with_video("2024-02-01T00:00:00Z", "No links in this one.")
                .with_video("2024-01-01T00:00:00Z", "Site: https://example.com/"),
        );
        let probe = Arc::new(
            FakeProbe::new()
                .status("https://example.com/gone", 404)
                .status("https://www.instagram.com/creator", 403)
                .status("https://example.com/", 200),
        );

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        let result = orchestrator(api, probe.clone(), 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_consistent(&result);
        assert_eq!(result.scanned_videos, 3);
        assert_eq!(result.videos_with_links, 2);
        assert_eq!(result.statistics.total_links, 3);
        assert_eq!(result.statistics.broken_links, 1);
        assert_eq!(result.statistics.warning_links, 1);
        assert_eq!(result.statistics.working_links, 1);

        // Feed order, then extraction order
        assert_eq!(result.results[0].video_id, "vid00000000");
        assert_eq!(result.results[0].video_title, "Video 0");
        assert_eq!(
            result.results[0].video_url,
            "https://www.youtube.com/watch?v=vid00000000"
        );
        assert_eq!(result.results[0].links[0].status, LinkStatus::Broken);
        assert_eq!(result.results[0].links[0].http_status_code, 404);
        assert_eq!(result.results[0].links[1].status, LinkStatus::Warning);
        assert_eq!(result.results[1].video_id, "vid00000002");
        assert_eq!(
            probe.calls(),
            vec![
                "https://example.com/gone",
                "https://www.instagram.com/creator",
                "https://example.com/"
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_channel_scans_nothing() {
        let api = Arc::new(FakeYouTube::new());
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@creator", 25, PlanLimit::Limited(50));
        let result = orchestrator(api, probe.clone(), 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_eq!(result.scanned_videos, 0);
        assert_eq!(result.videos_with_links, 0);
        assert_eq!(result.statistics, ScanStatistics::default());
        assert!(result.results.is_empty());
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plan_limit_caps_collection() {
        let api = Arc::new(FakeYouTube::new().with_videos(120, "https://example.com/"));
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@creator", 500, PlanLimit::Limited(50));
        let result = orchestrator(api.clone(), probe, 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_eq!(result.scanned_videos, 50);
        assert_eq!(result.videos_with_links, 50);
        assert_eq!(api.count(Endpoint::Videos), 50);
        assert_consistent(&result);
    }

    #[tokio::test]
    async fn test_zero_plan_limit_is_rejected_up_front() {
        let api = Arc::new(FakeYouTube::new().with_videos(3, "x"));
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Limited(0));
        let err = orchestrator(api.clone(), probe, 10_000)
            .scan(&request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScanError::PlanLimitExceeded { requested: 10, limit: 0 }
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_aborts() {
        let api = Arc::new(FakeYouTube::new());
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@someone-else", 10, PlanLimit::Unlimited);
        let err = orchestrator(api, probe, 10_000)
            .scan(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::ChannelNotFound(c) if c == "@someone-else"));
    }

    #[tokio::test]
    async fn test_missing_details_skip_only_that_video() {
        let mut fake = FakeYouTube::new().with_videos(3, "https://example.com/");
        fake.hidden.insert("vid00000001".to_string());
        let api = Arc::new(fake);
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        let result = orchestrator(api, probe, 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_eq!(result.scanned_videos, 3);
        assert_eq!(result.videos_with_links, 2);
        let ids: Vec<_> = result.results.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["vid00000000", "vid00000002"]);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_mid_scan_is_fatal() {
        let api = Arc::new(FakeYouTube::new().with_videos(3, "https://example.com/"));
        let probe = Arc::new(FakeProbe::new());

        // channels + one feed page + one video detail, then nothing left
        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        let err = orchestrator(api, probe.clone(), 3)
            .scan(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::QuotaExhausted));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_video_list() {
        let api = Arc::new(
            FakeYouTube::new()
                .with_video("2024-01-01T00:00:00Z", "https://a.example/")
                .with_video("2024-01-02T00:00:00Z", "https://b.example/"),
        );
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::videos(
            vec![
                "https://www.youtube.com/watch?v=vid00000001".to_string(),
                "not a video".to_string(),
                "https://youtu.be/vid00000000".to_string(),
            ],
            PlanLimit::Unlimited,
        );
        let result = orchestrator(api.clone(), probe, 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_eq!(result.scanned_videos, 2);
        assert_eq!(result.results[0].video_id, "vid00000001");
        assert_eq!(result.results[0].video_title, "Video 1");
        assert_eq!(result.results[1].links[0].url, "https://a.example/");
        // No channel lookup for explicit lists
        assert_eq!(api.count(Endpoint::Channels), 0);
    }

    #[tokio::test]
    async fn test_duplicate_links_are_probed_each_time() {
        let api = Arc::new(
            FakeYouTube::new()
                .with_video("2024-01-01T00:00:00Z", "https://a.example/ https://a.example/")
                .with_video("2024-01-01T00:00:00Z", "https://a.example/"),
        );
        let probe = Arc::new(FakeProbe::new());

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        let result = orchestrator(api, probe.clone(), 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_eq!(result.statistics.total_links, 3);
        assert_eq!(probe.attempts("https://a.example/"), 3);
    }

    #[tokio::test]
    async fn test_concurrent_probes_keep_order() {
        let description = (0..20)
            .map(|i| format!("https://site{i}.example/"))
            .collect::<Vec<_>>()
            .join(" ");
        let api = Arc::new(FakeYouTube::new().with_video("2024-01-01T00:00:00Z", &description));
        let probe = Arc::new(FakeProbe::new().status("https://site7.example/", 404));

        let request = ScanRequest::channel("@creator", 1, PlanLimit::Unlimited);
        let result = orchestrator(api, probe, 10_000)
            .with_concurrency(8)
            .scan(&request)
            .await
            .unwrap();

        let urls: Vec<_> = result.results[0].links.iter().map(|l| l.url.clone()).collect();
        let expected: Vec<_> = (0..20).map(|i| format!("https://site{i}.example/")).collect();
        assert_eq!(urls, expected);
        assert_eq!(result.results[0].links[7].status, LinkStatus::Broken);
        assert_eq!(result.statistics.broken_links, 1);
    }

    #[tokio::test]
    async fn test_cancelled_scan_returns_no_result() {
        let api = Arc::new(FakeYouTube::new().with_videos(2, "https://example.com/"));
        let probe = Arc::new(FakeProbe::new());

        let control = ScanControl::default();
        control.cancel.cancel();

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        let err = orchestrator(api, probe.clone(), 10_000)
            .scan_with(&request, &control)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Cancelled));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_stalled_link_check() {
        let api = Arc::new(
            FakeYouTube::new().with_video("2024-01-01T00:00:00Z", "https://slow.example/"),
        );
        let transport = Arc::new(StallingTransport::new(usize::MAX));

        let control = ScanControl::default();
        let cancel = control.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let request = ScanRequest::channel("@creator", 1, PlanLimit::Unlimited);
        let scan = orchestrator(api, transport.clone(), 10_000);
        let err = tokio::time::timeout(Duration::from_secs(5), scan.scan_with(&request, &control))
            .await
            .expect("cancellation should end the scan long before the stall does")
            .unwrap_err();

        assert!(matches!(err, ScanError::Cancelled));
        assert_eq!(transport.calls(), vec!["https://slow.example/"]);
    }

    #[tokio::test]
    async fn test_panicking_link_check_is_recorded_as_broken() {
        let api = Arc::new(FakeYouTube::new().with_video(
            "2024-01-01T00:00:00Z",
            "https://a.example/ https://boom.example/ https://b.example/",
        ));
        let transport = Arc::new(PanickingTransport::new("https://boom.example/"));

        let request = ScanRequest::channel("@creator", 1, PlanLimit::Unlimited);
        let result = orchestrator(api, transport, 10_000)
            .scan(&request)
            .await
            .unwrap();

        assert_consistent(&result);
        let links = &result.results[0].links;
        assert_eq!(links.len(), 3);
        assert_eq!(links[1], LinkProbeResult::failed("https://boom.example/"));
        assert_eq!(links[0].status, LinkStatus::Working);
        assert_eq!(links[0].http_status_code, 200);
        assert_eq!(links[2].status, LinkStatus::Working);
        assert_eq!(links[2].http_status_code, 200);
        assert_eq!(result.statistics.broken_links, 1);
        assert_eq!(result.statistics.working_links, 2);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let api = Arc::new(
            FakeYouTube::new()
                .with_video("2024-01-01T00:00:00Z", "https://a.example/")
                .with_video("2024-01-01T00:00:00Z", "nothing"),
        );
        let probe = Arc::new(FakeProbe::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let control = ScanControl {
            progress: Some(tx),
            ..ScanControl::default()
        };

        let request = ScanRequest::channel("@creator", 10, PlanLimit::Unlimited);
        orchestrator(api, probe, 10_000)
            .scan_with(&request, &control)
            .await
            .unwrap();
        drop(control);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ScanProgress::Collected { videos: 2 },
                ScanProgress::Extracted {
                    videos_with_links: 1,
                    links: 1
                },
                ScanProgress::VideoChecked {
                    video_id: "vid00000000".to_string(),
                    checked: 1,
                    total: 1
                },
            ]
        );
    }
}
