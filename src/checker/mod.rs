// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - extract: pulls URLs out of free-text descriptions
// - policy: fragile-domain list and the working/warning/broken rules
// - http: probes a URL over HTTP, with retries for fragile hosts
//
// This file (mod.rs) is the module root. It re-exports the public API so the
// rest of the app can write `checker::extract_video_links()` instead of
// `checker::extract::extract_video_links()`.
// =============================================================================

mod extract;
mod http;
mod policy;

pub use extract::{extract_video_links, ExtractedLink};
pub use http::{LinkHealthChecker, LinkProbeResult, LinkStatus};
pub use policy::ProbePolicy;

#[cfg(test)]
pub use http::{ProbeError, ProbeTransport};
