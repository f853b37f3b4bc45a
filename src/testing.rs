// src/testing.rs
// =============================================================================
// In-memory stand-ins for the two network seams, used by unit tests only.
//
// - FakeApi: answers metadata API calls from a closure or a script
// - FakeYouTube: a tiny in-memory channel with an uploads feed and videos
// - FakeProbe: answers link probes from per-URL scripts
// - StallingTransport: hangs for its first N calls, then answers 200
// - PanickingTransport: panics on one URL, answers 200 everywhere else
// =============================================================================

use crate::checker::{ProbeError, ProbeTransport};
use crate::youtube::{ApiResponse, ApiTransport, Endpoint, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
    pub api_key: String,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

type Handler =
    Box<dyn Fn(Endpoint, &[(&str, String)], &str) -> Result<ApiResponse, TransportError> + Send + Sync>;

pub struct FakeApi {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeApi {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Endpoint, &[(&str, String)], &str) -> Result<ApiResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers with each scripted response in turn.
    pub fn scripted(responses: Vec<Result<ApiResponse, TransportError>>) -> Self {
        let script = Mutex::new(VecDeque::from(responses));
        Self::new(move |_, _, _| {
            script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())))
        })
    }

    pub fn json(value: Value) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: value.to_string(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        api_key: &str,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            api_key: api_key.to_string(),
        });
        (self.handler)(endpoint, params, api_key)
    }
}

pub fn quota_exceeded() -> ApiResponse {
    ApiResponse {
        status: 403,
        body: json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [{"reason": "quotaExceeded", "domain": "youtube.quota"}]
            }
        })
        .to_string(),
    }
}

fn param<'a>(params: &'a [(&str, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.as_str())
}

pub struct FakeVideo {
    pub id: String,
    pub title: String,
    pub published_at: String,
    pub description: String,
}

/// A single channel whose uploads feed is served in pages.
pub struct FakeYouTube {
    pub channel_id: String,
    pub handle: String,
    pub uploads: String,
    pub videos: Vec<FakeVideo>,
    /// Videos whose details lookup comes back empty.
    pub hidden: HashSet<String>,
    /// Every call answers with a quota-exceeded error.
    pub out_of_quota: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeYouTube {
    pub fn new() -> Self {
        Self {
            channel_id: "UCxxxxxxxxxxxxxxxxxxxxxx".to_string(),
            handle: "@creator".to_string(),
            uploads: "UUxxxxxxxxxxxxxxxxxxxxxx".to_string(),
            videos: Vec::new(),
            hidden: HashSet::new(),
            out_of_quota: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Adds a video; ids are "vid" plus eight digits, in insertion (feed) order.
    pub fn with_video(mut self, published_at: &str, description: &str) -> Self {
        let n = self.videos.len();
        self.videos.push(FakeVideo {
            id: format!("vid{n:08}"),
            title: format!("Video {n}"),
            published_at: published_at.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn with_videos(mut self, count: usize, description: &str) -> Self {
        for _ in 0..count {
            self = self.with_video("2024-01-01T00:00:00Z", description);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    fn channels(&self, params: &[(&str, String)]) -> Value {
        let matches = param(params, "id") == Some(self.channel_id.as_str())
            || param(params, "forHandle") == Some(self.handle.as_str());
        if matches {
            json!({"items": [{
                "id": self.channel_id,
                "contentDetails": {"relatedPlaylists": {"uploads": self.uploads}}
            }]})
        } else {
            json!({"items": []})
        }
    }

    fn playlist_items(&self, params: &[(&str, String)]) -> ApiResponse {
        if param(params, "playlistId") != Some(self.uploads.as_str()) {
            return ApiResponse {
                status: 404,
                body: json!({"error": {"message": "playlist not found", "errors": [{"reason": "playlistNotFound"}]}})
                    .to_string(),
            };
        }

        let offset: usize = param(params, "pageToken")
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let page_size: usize = param(params, "maxResults")
            .and_then(|size| size.parse().ok())
            .unwrap_or(5);
        let end = (offset + page_size).min(self.videos.len());

        let items: Vec<Value> = self.videos[offset.min(end)..end]
            .iter()
            .map(|video| {
                json!({
                    "snippet": {
                        "title": video.title,
                        "publishedAt": video.published_at,
                        "resourceId": {"kind": "youtube#video", "videoId": video.id}
                    },
                    "contentDetails": {"videoId": video.id, "videoPublishedAt": video.published_at}
                })
            })
            .collect();

        let mut page = json!({"items": items});
        if end < self.videos.len() {
            page["nextPageToken"] = json!(end.to_string());
        }
        FakeApi::json(page)
    }

    fn video_details(&self, params: &[(&str, String)]) -> Value {
        let id = param(params, "id").unwrap_or_default();
        let items: Vec<Value> = self
            .videos
            .iter()
            .filter(|video| video.id == id && !self.hidden.contains(id))
            .map(|video| {
                json!({
                    "id": video.id,
                    "snippet": {
                        "title": video.title,
                        "description": video.description,
                        "publishedAt": video.published_at
                    }
                })
            })
            .collect();
        json!({"items": items})
    }
}

#[async_trait]
impl ApiTransport for FakeYouTube {
    async fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        api_key: &str,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            api_key: api_key.to_string(),
        });

        if self.out_of_quota {
            return Ok(quota_exceeded());
        }

        Ok(match endpoint {
            Endpoint::Channels => FakeApi::json(self.channels(params)),
            Endpoint::PlaylistItems => self.playlist_items(params),
            Endpoint::Videos => FakeApi::json(self.video_details(params)),
        })
    }
}

/// Probe transport driven by per-URL scripts. Unscripted URLs answer 200.
#[derive(Default)]
pub struct FakeProbe {
    scripts: Mutex<HashMap<String, VecDeque<Result<u16, ProbeError>>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, outcomes: Vec<Result<u16, ProbeError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), VecDeque::from(outcomes));
        self
    }

    pub fn status(self, url: &str, code: u16) -> Self {
        self.script(url, vec![Ok(code)])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, url: &str) -> usize {
        self.calls().iter().filter(|called| *called == url).count()
    }
}

#[async_trait]
impl ProbeTransport for FakeProbe {
    async fn fetch_status(&self, url: &str) -> Result<u16, ProbeError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            // The last scripted outcome repeats once the script runs out
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(Ok(200)),
            Some(script) => script.front().cloned().unwrap_or(Ok(200)),
            None => Ok(200),
        }
    }
}

/// Hangs (for an hour) on its first `stalls` calls, then answers 200.
pub struct StallingTransport {
    stalls: Mutex<usize>,
    calls: Mutex<Vec<String>>,
}

impl StallingTransport {
    pub fn new(stalls: usize) -> Self {
        Self {
            stalls: Mutex::new(stalls),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeTransport for StallingTransport {
    async fn fetch_status(&self, url: &str) -> Result<u16, ProbeError> {
        self.calls.lock().unwrap().push(url.to_string());
        let stall = {
            let mut stalls = self.stalls.lock().unwrap();
            if *stalls > 0 {
                *stalls -= 1;
                true
            } else {
                false
            }
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(200)
    }
}

/// Panics when asked about `url`; every other URL answers 200.
pub struct PanickingTransport {
    url: String,
}

impl PanickingTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl ProbeTransport for PanickingTransport {
    async fn fetch_status(&self, url: &str) -> Result<u16, ProbeError> {
        if url == self.url {
            panic!("transport blew up on {url}");
        }
        Ok(200)
    }
}
