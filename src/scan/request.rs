// src/scan/request.rs
// =============================================================================
// What a caller asks the scanner to do.
//
// A request targets either a channel (the scanner discovers its videos) or an
// explicit list of video URLs, asks for some number of videos, and carries
// the plan limit the caller's billing side allows.
// =============================================================================

use chrono::NaiveDate;
use std::str::FromStr;

use crate::youtube::DateRange;

/// Where the videos come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// Channel id, @handle or channel URL
    Channel(String),
    /// Explicit video URLs (or bare ids)
    Videos(Vec<String>),
}

/// How many videos the caller's plan allows per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanLimit {
    Limited(usize),
    Unlimited,
}

impl PlanLimit {
    /// The number of videos a scan will actually collect.
    pub fn enforce(self, requested: usize) -> usize {
        match self {
            PlanLimit::Limited(limit) => requested.min(limit),
            PlanLimit::Unlimited => requested,
        }
    }
}

impl FromStr for PlanLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(PlanLimit::Unlimited);
        }
        s.parse::<usize>()
            .map(PlanLimit::Limited)
            .map_err(|_| format!("expected a number or \"unlimited\", got {s:?}"))
    }
}

impl std::fmt::Display for PlanLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanLimit::Limited(limit) => write!(f, "{limit}"),
            PlanLimit::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// One inbound scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: ScanTarget,
    pub requested_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub plan_limit: PlanLimit,
}

impl ScanRequest {
    pub fn channel(channel: impl Into<String>, requested_count: usize, plan_limit: PlanLimit) -> Self {
        Self {
            target: ScanTarget::Channel(channel.into()),
            requested_count,
            start_date: None,
            end_date: None,
            plan_limit,
        }
    }

    /// Explicit video list; the requested count is the list length.
    pub fn videos(urls: Vec<String>, plan_limit: PlanLimit) -> Self {
        Self {
            requested_count: urls.len(),
            target: ScanTarget::Videos(urls),
            start_date: None,
            end_date: None,
            plan_limit,
        }
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn enforced_count(&self) -> usize {
        self.plan_limit.enforce(self.requested_count)
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
