//! What to compare: two publications and a query.

use std::path::Path;

use pubcompare_shared::{PubCompareError, Result, StepContext};

use crate::documents::publication_path;

/// Built-in query lenses. Any other non-empty text is a custom query.
pub const QUERY_PRESETS: [&str; 5] = [
    "Tool Usage",
    "Evaluation Methods",
    "Task Types",
    "Datasets",
    "Results",
];

/// A user's comparison request before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonRequest {
    pub pub1: Option<String>,
    pub pub2: Option<String>,
    pub query: String,
}

impl ComparisonRequest {
    pub fn new(pub1: impl Into<String>, pub2: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            pub1: Some(pub1.into()),
            pub2: Some(pub2.into()),
            query: query.into(),
        }
    }

    /// Reject requests the pipeline must not start on.
    pub fn validate(&self) -> Result<()> {
        let selected = |p: &Option<String>| p.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !selected(&self.pub1) || !selected(&self.pub2) {
            return Err(PubCompareError::validation("please select both publications"));
        }
        if self.query.trim().is_empty() {
            return Err(PubCompareError::validation("please enter a query"));
        }
        Ok(())
    }

    pub fn is_preset(&self) -> bool {
        QUERY_PRESETS.contains(&self.query.trim())
    }

    /// Validate and build the initial context, resolving bare names under `dir`.
    pub fn into_context(self, dir: &Path) -> Result<StepContext> {
        self.validate()?;
        let (Some(pub1), Some(pub2)) = (self.pub1, self.pub2) else {
            return Err(PubCompareError::validation("please select both publications"));
        };
        Ok(StepContext::new(
            publication_path(dir, pub1.trim()),
            publication_path(dir, pub2.trim()),
            self.query.trim(),
        ))
    }
}
