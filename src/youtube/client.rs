// src/youtube/client.rs
// =============================================================================
// The quota-managed metadata API client.
//
// Every call goes through make_request(), which:
// 1. Leases a credential from the pool (reserving the endpoint's quota cost)
// 2. Sends the request, retrying once on a transient network failure
// 3. On a quota-exceeded answer, marks that credential exhausted and starts
//    over with the next one
// 4. Fails with QuotaExhausted once the pool has nothing left
//
// The actual HTTP lives behind the ApiTransport trait so tests can script the
// API's answers without touching the network.
// =============================================================================

use crate::error::ApiError;
use crate::youtube::quota::CredentialPool;
use crate::youtube::types::ErrorResponse;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

// Total tries for one request when the network misbehaves
const MAX_TRANSPORT_ATTEMPTS: usize = 2;

// Error reasons YouTube uses when a key's quota is gone
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

/// The API operations the scanner needs, with their quota price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `channels.list`: resolve a channel to its uploads feed
    Channels,
    /// `playlistItems.list`: one page of a feed
    PlaylistItems,
    /// `videos.list`: full details (description) of a video
    Videos,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Channels => "channels",
            Endpoint::PlaylistItems => "playlistItems",
            Endpoint::Videos => "videos",
        }
    }

    /// Quota units billed per call.
    ///
    /// See: <https://developers.google.com/youtube/v3/determine_quota_cost>
    pub fn cost(self) -> u64 {
        match self {
            Endpoint::Channels | Endpoint::PlaylistItems | Endpoint::Videos => 1,
        }
    }
}

/// Raw answer from the API: status code and body text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for a 403 whose error envelope names a quota reason.
    pub fn is_quota_exceeded(&self) -> bool {
        if self.status != 403 {
            return false;
        }
        match serde_json::from_str::<ErrorResponse>(&self.body) {
            Ok(envelope) => envelope
                .error
                .errors
                .iter()
                .any(|detail| QUOTA_REASONS.contains(&detail.reason.as_str())),
            Err(_) => false,
        }
    }

    fn error_message(&self) -> String {
        serde_json::from_str::<ErrorResponse>(&self.body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| self.body.chars().take(200).collect())
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

/// Sends one GET to the metadata API.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        api_key: &str,
    ) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport against the real API.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        api_key: &str,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, endpoint.path());

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("read body: {e}")))?;

        Ok(ApiResponse { status, body })
    }
}

/// Client that spreads requests over a pool of API keys.
#[derive(Clone)]
pub struct QuotaManagedApiClient {
    transport: Arc<dyn ApiTransport>,
    pool: Arc<CredentialPool>,
    retry_delay: Duration,
}

impl std::fmt::Debug for QuotaManagedApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaManagedApiClient")
            .field("pool", &self.pool)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl QuotaManagedApiClient {
    pub fn new(transport: Arc<dyn ApiTransport>, pool: Arc<CredentialPool>) -> Self {
        Self {
            transport,
            pool,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Delay between the two attempts of a transiently failing request.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Performs one named request and returns the JSON payload.
    #[instrument(skip(self, params), fields(endpoint = endpoint.path()), level = "debug")]
    pub async fn make_request(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        loop {
            let lease = self
                .pool
                .acquire(endpoint.cost())
                .ok_or(ApiError::QuotaExhausted)?;

            let response = match self.send_with_retry(endpoint, params, lease.key()).await {
                Ok(response) => response,
                Err(err) => {
                    // Never reached the API, so nothing was billed
                    self.pool.release(&lease);
                    return Err(err);
                }
            };

            if response.is_success() {
                tracing::debug!(credential = lease.credential_id(), "request succeeded");
                return serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
                    endpoint: endpoint.path(),
                    source,
                });
            }

            if response.is_quota_exceeded() {
                self.pool.mark_exhausted(&lease);
                continue;
            }

            return Err(ApiError::Status {
                endpoint: endpoint.path(),
                status: response.status,
                message: response.error_message(),
            });
        }
    }

    /// Same as make_request, decoded into a typed response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let payload = self.make_request(endpoint, params).await?;
        serde_json::from_value(payload).map_err(|source| ApiError::Decode {
            endpoint: endpoint.path(),
            source,
        })
    }

    // Transport errors and 5xx answers count as transient.
    async fn send_with_retry(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        api_key: &str,
    ) -> Result<ApiResponse, ApiError> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_TRANSPORT_ATTEMPTS {
            match self.transport.get(endpoint, params, api_key).await {
                Ok(response) if response.status >= 500 => {
                    last_error = format!("HTTP {}", response.status);
                }
                Ok(response) => return Ok(response),
                Err(TransportError(message)) => {
                    last_error = message;
                }
            }

            tracing::debug!(attempt, error = %last_error, "transient API failure");
            if attempt < MAX_TRANSPORT_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(ApiError::TransientNetwork(format!(
            "{} failed after {} attempts: {}",
            endpoint.path(),
            MAX_TRANSPORT_ATTEMPTS,
            last_error
        )))
    }
}
