//! Capability interfaces for the collaborators the pipeline calls out to.
//!
//! All ports are blocking from the caller's point of view. The pipeline runs
//! them on blocking threads under a deadline, so implementations must be
//! `Send + Sync` and must not assume an async context.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::Result;

/// Text completion from a generative model. One request per call, no streaming.
pub trait GenerativeModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Web search used by the enrichment agent.
pub trait SearchTool: Send + Sync {
    fn search(&self, query: &str) -> Result<String>;
}

/// Multi-step enrichment agent. One blocking call, one text result.
///
/// Implementations absorb formatting errors from their own intermediate
/// reasoning, and should return early once `deadline` has expired.
pub trait EnrichmentAgent: Send + Sync {
    fn run(&self, instruction: &str, deadline: &Deadline) -> Result<String>;
}

/// Reads a publication, returning at most the configured character budget.
pub trait DocumentSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;
}

/// Point in time after which cooperative work should stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(limit),
        }
    }

    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}
