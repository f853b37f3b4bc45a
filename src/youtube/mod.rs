// src/youtube/mod.rs
// =============================================================================
// This module talks to the YouTube Data API.
//
// Submodules:
// - quota: the credential pool and its per-key quota accounting
// - client: quota-managed request issuing with key rotation
// - types: the JSON shapes of the API responses we read
// - discovery: channel -> uploads feed -> videos, plus video details
// - video_url: pulling video ids out of the links users paste
// =============================================================================

mod client;
mod discovery;
mod quota;
mod types;
mod video_url;

pub use client::{QuotaManagedApiClient, ReqwestTransport, DEFAULT_BASE_URL};
pub use discovery::{ChannelRef, ChannelVideoDiscovery, DateRange, VideoRef};
pub use quota::CredentialPool;
pub use video_url::parse_video_id;

#[cfg(test)]
pub use client::{ApiResponse, ApiTransport, Endpoint, TransportError};
