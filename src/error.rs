// src/error.rs
// =============================================================================
// Error types for the scan engine.
//
// Two layers:
// - ApiError: anything that went wrong talking to the video metadata API
// - ScanError: the single fatal outcome a scan can end with
//
// Per-item problems (one video whose details can't be fetched, one link that
// can't be probed) are NOT errors at this level. The orchestrator absorbs
// them into the result so one bad item never voids the whole batch.
//
// Rust concepts:
// - thiserror: derive std::error::Error + Display from attributes
// - From: lets the ? operator convert one error type into another
// =============================================================================

use thiserror::Error;

/// Errors returned by the quota-managed metadata API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Every pooled credential is out of quota.
    #[error("all API credentials have exhausted their quota")]
    QuotaExhausted,

    /// The request never got a usable answer after the bounded retry.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The API answered with a non-success status that isn't a quota signal.
    #[error("{endpoint} request failed with HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    /// The API answered 2xx but the body didn't have the expected shape.
    #[error("could not decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("video details unavailable: {0}")]
    VideoDetailUnavailable(String),
}

impl ApiError {
    /// Quota exhaustion is fatal in every phase of a scan.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, ApiError::QuotaExhausted)
    }
}

/// Fatal scan outcomes. A scan either returns a complete result or exactly
/// one of these.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("API quota exhausted for every configured key, try again later")]
    QuotaExhausted,

    #[error("plan limit exceeded: requested {requested} video(s) but the plan allows {limit}")]
    PlanLimitExceeded { requested: usize, limit: usize },

    #[error("upstream API error: {0}")]
    Upstream(ApiError),

    #[error("scan cancelled")]
    Cancelled,
}

impl From<ApiError> for ScanError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::QuotaExhausted => ScanError::QuotaExhausted,
            ApiError::ChannelNotFound(channel) => ScanError::ChannelNotFound(channel),
            other => ScanError::Upstream(other),
        }
    }
}
