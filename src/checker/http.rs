// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - Makes a GET with browser-like headers (some hosts block default client
//   signatures, which would show up as false "broken" results)
// - Follows redirects
// - Classifies the outcome with the domain-aware rules in policy.rs
// - Retries fragile hosts a bounded number of times with a fixed delay
//
// Rust concepts:
// - Traits: ProbeTransport hides reqwest so tests can script answers
// - async/await: each probe is one suspension point
// - Bounded loops: retries are a plain for-loop, not recursion
// =============================================================================

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use super::policy::{ProbePolicy, Verdict};

/// The three verdicts a link can get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// Link answered 2xx
    Working,
    /// Reachable through a redirect, or possibly blocked by anti-bot measures
    Warning,
    /// Link is dead (404, 410, unreachable host, etc.)
    Broken,
}

/// The result of probing one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProbeResult {
    /// The URL that was checked
    pub url: String,
    pub status: LinkStatus,
    /// Last HTTP status seen, 0 when no response came back
    pub http_status_code: u16,
}

impl LinkProbeResult {
    /// A probe that failed outright: recorded as broken with no status code.
    pub fn failed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: LinkStatus::Broken,
            http_status_code: 0,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.status == LinkStatus::Broken
    }
}

/// Why an attempt produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The attempt hit its deadline
    #[error("request timed out")]
    Timeout,
    /// DNS, TLS, connection, redirect-loop and other transport failures
    #[error("{0}")]
    Transport(String),
    /// The URL can't even be turned into a request
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Performs one attempt and reports the final HTTP status code.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn fetch_status(&self, url: &str) -> Result<u16, ProbeError>;
}

/// reqwest-backed probe transport.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// Builds a client with browser-like default headers, the policy's
    /// per-attempt timeout and redirect limit.
    pub fn new(policy: &ProbePolicy) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
        headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
        headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&policy.user_agent)?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(policy.timeout())
            .redirect(reqwest::redirect::Policy::limited(policy.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for ReqwestProbe {
    async fn fetch_status(&self, url: &str) -> Result<u16, ProbeError> {
        // The body is never read; dropping the response closes it
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(categorize_error(e)),
        }
    }
}

// Sorts reqwest errors into the three ProbeError kinds, keeping a readable
// reason for the logs.
fn categorize_error(error: reqwest::Error) -> ProbeError {
    let error_string = error.to_string();

    if error.is_timeout() {
        ProbeError::Timeout
    } else if error.is_builder() {
        ProbeError::InvalidUrl(error_string)
    } else if error.is_redirect() {
        ProbeError::Transport("too many redirects".to_string())
    } else if error.is_connect() {
        // Connection errors often mean DNS issues or host unreachable
        if error_string.contains("dns") {
            ProbeError::Transport("could not resolve hostname".to_string())
        } else {
            ProbeError::Transport(format!("connection failed: {error_string}"))
        }
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        ProbeError::Transport("SSL certificate error".to_string())
    } else {
        ProbeError::Transport(error_string)
    }
}

/// Probes links and classifies them, retrying fragile hosts.
#[derive(Clone)]
pub struct LinkHealthChecker {
    transport: Arc<dyn ProbeTransport>,
    policy: Arc<ProbePolicy>,
}

impl std::fmt::Debug for LinkHealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHealthChecker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LinkHealthChecker {
    pub fn new(transport: Arc<dyn ProbeTransport>, policy: ProbePolicy) -> Self {
        Self {
            transport,
            policy: Arc::new(policy),
        }
    }

    /// A checker that talks to the real network.
    pub fn with_reqwest(policy: ProbePolicy) -> anyhow::Result<Self> {
        let transport = ReqwestProbe::new(&policy)?;
        Ok(Self::new(Arc::new(transport), policy))
    }

    /// Probes one URL and classifies it. Never fails: anything that goes
    /// wrong ends up as a warning or broken verdict.
    #[instrument(skip(self), level = "debug")]
    pub async fn probe(&self, url: &str) -> LinkProbeResult {
        let fragile = self.policy.is_fragile(url);
        // Only fragile hosts get extra attempts
        let attempts = if fragile {
            self.policy.max_retries.saturating_add(1)
        } else {
            1
        };

        let mut last = LinkProbeResult::failed(url);

        for attempt in 1..=attempts {
            let (verdict, code) = match self.attempt(url).await {
                Ok(code) => (self.policy.classify_status(code, fragile), code),
                Err(error) => {
                    tracing::debug!(attempt, %error, "probe attempt failed");
                    (self.policy.classify_error(&error, fragile), 0)
                }
            };

            last = LinkProbeResult {
                url: url.to_string(),
                status: verdict.status(),
                http_status_code: code,
            };

            match verdict {
                Verdict::Settled(_) => break,
                Verdict::Retryable(_) if attempt < attempts => {
                    tracing::debug!(attempt, code, "retrying fragile host");
                    tokio::time::sleep(self.policy.retry_delay()).await;
                }
                Verdict::Retryable(_) => {}
            }
        }

        tracing::debug!(status = ?last.status, code = last.http_status_code, "probe finished");
        last
    }

    // One attempt under the policy deadline, whatever the transport's own
    // timeout is.
    async fn attempt(&self, url: &str) -> Result<u16, ProbeError> {
        match tokio::time::timeout(self.policy.timeout(), self.transport.fetch_status(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why Arc<dyn ProbeTransport>?
//    - dyn Trait lets the checker hold "anything that can fetch a status"
//    - Arc lets many clones of the checker share one transport
//    - In production that's reqwest, in tests it's a scripted fake
//
// 2. Why a for-loop for retries?
//    - The number of attempts is known up front
//    - Each attempt's result is kept in `last`, so when attempts run out we
//      already hold the answer to return
//
// 3. What does tokio::time::timeout do?
//    - Races a future against a timer
//    - Returns Err(Elapsed) if the timer wins, and the future is dropped
// -----------------------------------------------------------------------------
