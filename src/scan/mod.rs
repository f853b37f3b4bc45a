// src/scan/mod.rs
// =============================================================================
// This module runs scans: collect videos, extract their links, check them.
//
// Submodules:
// - request: what the caller asks for (target, counts, dates, plan limit)
// - result: what comes back (per-video links and aggregate statistics)
// - orchestrator: the three-phase pipeline itself
// =============================================================================

mod orchestrator;
mod request;
mod result;

pub use orchestrator::{ScanControl, ScanOrchestrator, ScanProgress};
pub use request::{PlanLimit, ScanRequest};
pub use result::ScanResult;
