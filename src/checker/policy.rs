// src/checker/policy.rs
// =============================================================================
// The rules that turn an HTTP outcome into working / warning / broken.
//
// Some hosts (social networks, URL shorteners, shops, screenshot hosts) block
// automated clients. Treating their 403s and 429s as "broken" would flag
// links that work fine in a browser, so those "fragile" hosts get:
// - the benefit of the doubt on most 4xx codes (warning, not broken)
// - retries on 5xx, timeouts and connection failures
//
// The fragile list and the codes that stay "broken" on fragile hosts are
// data, loaded from config, with the defaults below.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::http::{LinkStatus, ProbeError};

/// Tunable knobs for link probing. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbePolicy {
    /// Deadline for one probe attempt.
    pub timeout_secs: u64,
    /// Pause between attempts on a fragile host.
    pub retry_delay_secs: u64,
    /// Extra attempts allowed on a fragile host (0 disables retries).
    pub max_retries: u32,
    /// Redirect hops followed before giving up.
    pub max_redirects: usize,
    /// Host suffixes treated as fragile. An entry ending in '.' (like
    /// "amazon.") matches that label under any TLD.
    pub fragile_domains: Vec<String>,
    /// 4xx codes that still mean "broken" on a fragile host.
    pub fragile_broken_codes: Vec<u16>,
    pub user_agent: String,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            retry_delay_secs: 2,
            max_retries: 2,
            max_redirects: 10,
            fragile_domains: DEFAULT_FRAGILE_DOMAINS.iter().map(|d| d.to_string()).collect(),
            fragile_broken_codes: vec![404, 410],
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_FRAGILE_DOMAINS: &[&str] = &[
    // social networks
    "facebook.com",
    "fb.com",
    "fb.me",
    "instagram.com",
    "twitter.com",
    "x.com",
    "threads.net",
    "tiktok.com",
    "linkedin.com",
    "pinterest.com",
    "reddit.com",
    "snapchat.com",
    "discord.gg",
    "discord.com",
    "patreon.com",
    "twitch.tv",
    // shorteners
    "bit.ly",
    "t.co",
    "tinyurl.com",
    "goo.gl",
    "ow.ly",
    "buff.ly",
    "is.gd",
    "rebrand.ly",
    "linktr.ee",
    "amzn.to",
    // shops
    "amazon.",
    "ebay.",
    "etsy.com",
    "aliexpress.com",
    "walmart.com",
    "bestbuy.com",
    "target.com",
    // screenshot / image hosts
    "imgur.com",
    "prnt.sc",
    "prntscr.com",
    "gyazo.com",
    "ibb.co",
];

/// What one attempt's outcome means for the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Final, no matter how many attempts remain.
    Settled(LinkStatus),
    /// Worth another attempt on a fragile host; this status stands if no
    /// attempts remain.
    Retryable(LinkStatus),
}

impl Verdict {
    pub fn status(self) -> LinkStatus {
        match self {
            Verdict::Settled(status) | Verdict::Retryable(status) => status,
        }
    }
}

impl ProbePolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Whether the URL's host is on the fragile list.
    pub fn is_fragile(&self, url: &str) -> bool {
        let host = match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.to_ascii_lowercase(),
                None => return false,
            },
            Err(_) => return false,
        };

        self.fragile_domains
            .iter()
            .any(|domain| host_matches(&host, &domain.to_ascii_lowercase()))
    }

    /// Classifies an HTTP status code.
    pub fn classify_status(&self, code: u16, fragile: bool) -> Verdict {
        match code {
            200..=299 => Verdict::Settled(LinkStatus::Working),
            300..=399 => Verdict::Settled(LinkStatus::Warning),
            400..=499 if !fragile => Verdict::Settled(LinkStatus::Broken),
            400..=499 if self.fragile_broken_codes.contains(&code) => {
                Verdict::Settled(LinkStatus::Broken)
            }
            // 400/403/405/429 and friends on a fragile host: anti-bot noise
            400..=499 => Verdict::Settled(LinkStatus::Warning),
            500..=599 => Verdict::Retryable(LinkStatus::Warning),
            _ => Verdict::Settled(LinkStatus::Warning),
        }
    }

    /// Classifies an attempt that produced no HTTP response.
    pub fn classify_error(&self, error: &ProbeError, fragile: bool) -> Verdict {
        match error {
            ProbeError::Timeout => Verdict::Retryable(LinkStatus::Warning),
            ProbeError::Transport(_) if fragile => Verdict::Retryable(LinkStatus::Warning),
            ProbeError::Transport(_) => Verdict::Settled(LinkStatus::Broken),
            ProbeError::InvalidUrl(_) => Verdict::Settled(LinkStatus::Broken),
        }
    }
}

// "www.instagram.com" matches "instagram.com"; "notinstagram.com" doesn't.
// "amazon." matches "amazon.de" and "www.amazon.co.uk".
fn host_matches(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }

    if domain.ends_with('.') {
        return host.starts_with(domain) || host.contains(&format!(".{domain}"));
    }

    host == domain || host.ends_with(&format!(".{domain}"))
}
