// src/youtube/discovery.rs
// =============================================================================
// Channel video discovery: channel -> uploads feed -> bounded list of videos.
//
// Strategy:
// - Resolve the channel (id, @handle, or channel URL) with channels.list and
//   read its "uploads" playlist id
// - Page through playlistItems.list in fixed batches of 50, following the
//   nextPageToken, until we have max_results videos or the feed ends
// - Apply the optional date range to each page after it arrives, so a page
//   can be partly thrown away
//
// Also fetches the full details (description) of single videos for the
// extract phase of a scan.
// =============================================================================

use crate::error::ApiError;
use crate::youtube::client::{Endpoint, QuotaManagedApiClient};
use crate::youtube::types::{ChannelListResponse, PlaylistItemListResponse, VideoListResponse};
use crate::youtube::video_url::canonical_video_url;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;
use url::Url;

// Largest page playlistItems.list will hand out
pub const PAGE_SIZE: usize = 50;

/// How a channel was identified by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// A raw channel id like "UC..."
    Id(String),
    /// An @handle (kept with its leading @)
    Handle(String),
    /// A legacy /user/ name
    Username(String),
}

impl ChannelRef {
    /// Parses a channel id, @handle, or channel URL.
    ///
    /// Anything we can't recognise is treated as a raw channel id and left
    /// for the API to accept or reject.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.starts_with('@') {
            return ChannelRef::Handle(input.to_string());
        }

        let url = Url::parse(input).or_else(|_| Url::parse(&format!("https://{input}")));
        if let Ok(url) = url {
            let is_youtube = url
                .host_str()
                .map(|host| host.trim_start_matches("www.").trim_start_matches("m.") == "youtube.com")
                .unwrap_or(false);

            if is_youtube {
                let segments: Vec<&str> = url
                    .path_segments()
                    .map(|s| s.filter(|s| !s.is_empty()).collect())
                    .unwrap_or_default();

                match segments.as_slice() {
                    ["channel", id, ..] => return ChannelRef::Id(id.to_string()),
                    ["user", name, ..] => return ChannelRef::Username(name.to_string()),
                    [handle, ..] if handle.starts_with('@') => {
                        return ChannelRef::Handle(handle.to_string())
                    }
                    _ => {}
                }
            }
        }

        ChannelRef::Id(input.to_string())
    }

    fn query_param(&self) -> (&'static str, String) {
        match self {
            ChannelRef::Id(id) => ("id", id.clone()),
            ChannelRef::Handle(handle) => ("forHandle", handle.clone()),
            ChannelRef::Username(name) => ("forUsername", name.clone()),
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRef::Id(id) => write!(f, "{id}"),
            ChannelRef::Handle(handle) => write!(f, "{handle}"),
            ChannelRef::Username(name) => write!(f, "user/{name}"),
        }
    }
}

/// A video in the feed. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub external_id: String,
    pub title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl VideoRef {
    /// A reference known only by id (explicit video lists); title and date
    /// are filled in by the details fetch.
    pub fn from_id(video_id: impl Into<String>) -> Self {
        let external_id = video_id.into();
        Self {
            url: canonical_video_url(&external_id),
            external_id,
            title: String::new(),
            published_at: None,
        }
    }
}

/// Full details of one video, as needed by the extract phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Inclusive publish-date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Videos with an unknown publish date only pass an unbounded range.
    pub fn contains(&self, published_at: Option<DateTime<Utc>>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(published_at) = published_at else {
            return false;
        };
        let day = published_at.date_naive();
        self.start.map_or(true, |start| day >= start) && self.end.map_or(true, |end| day <= end)
    }
}

/// Looks up channels, pages their upload feeds, and fetches video details.
#[derive(Debug, Clone)]
pub struct ChannelVideoDiscovery {
    client: QuotaManagedApiClient,
}

impl ChannelVideoDiscovery {
    pub fn new(client: QuotaManagedApiClient) -> Self {
        Self { client }
    }

    /// Resolves a channel to the id of its uploads feed.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_uploads_feed(&self, channel: &ChannelRef) -> Result<String, ApiError> {
        let params = [("part", "contentDetails".to_string()), channel.query_param()];

        let response: ChannelListResponse = self.client.request(Endpoint::Channels, &params).await?;

        let feed_id = response
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|d| d.related_playlists)
            .and_then(|p| p.uploads)
            .ok_or_else(|| ApiError::ChannelNotFound(channel.to_string()))?;

        tracing::debug!(%channel, feed_id = %feed_id, "resolved uploads feed");
        Ok(feed_id)
    }

    /// Lists up to `max_results` videos of a feed, in feed order.
    ///
    /// Every call pages from the start of the feed. Any error, quota
    /// exhaustion included, aborts the listing without partial results.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_videos(
        &self,
        feed_id: &str,
        max_results: usize,
        range: DateRange,
    ) -> Result<Vec<VideoRef>, ApiError> {
        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        while videos.len() < max_results {
            let mut params = vec![
                ("part", "snippet,contentDetails".to_string()),
                ("playlistId", feed_id.to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: PlaylistItemListResponse =
                self.client.request(Endpoint::PlaylistItems, &params).await?;
            pages += 1;

            for item in &page.items {
                if videos.len() >= max_results {
                    break;
                }
                let Some(video_id) = item.video_id() else {
                    continue;
                };
                let published_at = item.published_at();
                if !range.contains(published_at) {
                    continue;
                }
                videos.push(VideoRef {
                    external_id: video_id.to_string(),
                    title: item.snippet.title.clone(),
                    published_at,
                    url: canonical_video_url(video_id),
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(feed_id, pages, videos = videos.len(), "listed feed");
        Ok(videos)
    }

    /// Fetches title and description of a single video.
    #[instrument(skip(self), level = "debug")]
    pub async fn video_details(&self, video_id: &str) -> Result<VideoDetails, ApiError> {
        let params = [("part", "snippet".to_string()), ("id", video_id.to_string())];

        let response: VideoListResponse = self.client.request(Endpoint::Videos, &params).await?;

        let video = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::VideoDetailUnavailable(video_id.to_string()))?;

        Ok(VideoDetails {
            title: video.snippet.title,
            description: video.snippet.description,
            published_at: video.snippet.published_at,
        })
    }
}
