//! Core domain types for a publication comparison run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PubCompareError, Result};

/// Timestamp format used in every artifact file name (second resolution).
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of the fixed analysis sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AnalyzePub1,
    AnalyzePub2,
    Compare,
    AggregateTrends,
    Summarize,
    FactCheck,
    #[serde(rename = "react_agent_tool")]
    Enrich,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 7] = [
        Stage::AnalyzePub1,
        Stage::AnalyzePub2,
        Stage::Compare,
        Stage::AggregateTrends,
        Stage::Summarize,
        Stage::FactCheck,
        Stage::Enrich,
    ];

    /// Name recorded in `lnode` after the stage runs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzePub1 => "analyze_pub1",
            Self::AnalyzePub2 => "analyze_pub2",
            Self::Compare => "compare",
            Self::AggregateTrends => "aggregate_trends",
            Self::Summarize => "summarize",
            Self::FactCheck => "fact_check",
            Self::Enrich => "react_agent_tool",
        }
    }

    /// Zero-based position in [`Stage::ORDER`].
    pub fn index(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    /// The stage that must have run immediately before this one.
    pub fn previous(&self) -> Option<Stage> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// The stage that runs after this one, `None` for the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        Self::ORDER.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Publication identity
// ---------------------------------------------------------------------------

/// Which of the two compared publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
    First,
    Second,
}

impl Publication {
    /// Short label used in logs and file names (`pub1` / `pub2`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::First => "pub1",
            Self::Second => "pub2",
        }
    }

    /// The analyze stage that extracts this publication's profile.
    pub fn analyze_stage(&self) -> Stage {
        match self {
            Self::First => Stage::AnalyzePub1,
            Self::Second => Stage::AnalyzePub2,
        }
    }
}

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\- ]").expect("valid filename regex"));

/// Sanitize a title or stem so it is safe to embed in a file name.
pub fn clean_filename(title: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(title, "_")
        .trim()
        .to_string()
}

/// Sanitized file stem of a publication path (`papers/a.b.txt` -> `a_b`).
pub fn publication_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    clean_filename(&stem)
}

// ---------------------------------------------------------------------------
// RunStamp
// ---------------------------------------------------------------------------

/// `YYYYMMDD_HHMMSS` timestamp fixed when a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunStamp(String);

impl RunStamp {
    /// Stamp for the current local time.
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Stamp for a given instant.
    pub fn from_datetime<Tz: chrono::TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(at.format(RUN_STAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Five-field structured summary extracted from one publication.
///
/// Every field is always present after validation, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedProfile {
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub evaluation_methods: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub task_types: Vec<String>,
    #[serde(default)]
    pub results: Vec<String>,
}

impl ValidatedProfile {
    /// Required keys, in the order the extraction prompt lists them.
    pub const FIELDS: [&'static str; 5] = [
        "tools",
        "evaluation_methods",
        "datasets",
        "task_types",
        "results",
    ];

    /// Mutable access to a field by its JSON key.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "tools" => Some(&mut self.tools),
            "evaluation_methods" => Some(&mut self.evaluation_methods),
            "datasets" => Some(&mut self.datasets),
            "task_types" => Some(&mut self.task_types),
            "results" => Some(&mut self.results),
            _ => None,
        }
    }

    /// True when every field is an empty list.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.evaluation_methods.is_empty()
            && self.datasets.is_empty()
            && self.task_types.is_empty()
            && self.results.is_empty()
    }
}

/// Extraction result: a structured record, or the model's raw text when it
/// could not be read as JSON at all. Consumers must branch on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Profile {
    Structured(ValidatedProfile),
    Raw(String),
}

impl Profile {
    pub fn as_structured(&self) -> Option<&ValidatedProfile> {
        match self {
            Self::Structured(p) => Some(p),
            Self::Raw(_) => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Text form used when the profile is inserted into a later prompt.
    pub fn render_for_prompt(&self) -> String {
        match self {
            Self::Structured(p) => serde_json::to_string_pretty(p).unwrap_or_default(),
            Self::Raw(text) => format!("[unstructured extraction]\n{text}"),
        }
    }
}

// ---------------------------------------------------------------------------
// StepContext
// ---------------------------------------------------------------------------

/// The value a stage contributes to the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    Pub1Profile(Profile),
    Pub2Profile(Profile),
    Comparison(String),
    Trends(String),
    Summary(String),
    FactCheck(String),
    ExtraInfo(String),
}

impl StageOutput {
    /// The stage that owns this output field.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Pub1Profile(_) => Stage::AnalyzePub1,
            Self::Pub2Profile(_) => Stage::AnalyzePub2,
            Self::Comparison(_) => Stage::Compare,
            Self::Trends(_) => Stage::AggregateTrends,
            Self::Summary(_) => Stage::Summarize,
            Self::FactCheck(_) => Stage::FactCheck,
            Self::ExtraInfo(_) => Stage::Enrich,
        }
    }
}

/// State threaded through the pipeline.
///
/// Inputs are fixed at construction. Each output field is written exactly once,
/// by its owning stage, through [`StepContext::record`], which consumes the
/// context and returns the successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContext {
    run_id: Uuid,
    run_stamp: RunStamp,
    pub1_path: PathBuf,
    pub2_path: PathBuf,
    user_query: String,
    pub1_profile: Option<Profile>,
    pub2_profile: Option<Profile>,
    comparison: Option<String>,
    trends: Option<String>,
    summary: Option<String>,
    fact_check: Option<String>,
    extra_info: Option<String>,
    lnode: Option<Stage>,
    count: u32,
}

impl StepContext {
    /// Fresh context with every output unset, stamped with the current time.
    pub fn new(
        pub1_path: impl Into<PathBuf>,
        pub2_path: impl Into<PathBuf>,
        user_query: impl Into<String>,
    ) -> Self {
        Self::with_stamp(pub1_path, pub2_path, user_query, RunStamp::now())
    }

    /// Fresh context with an explicit run stamp.
    pub fn with_stamp(
        pub1_path: impl Into<PathBuf>,
        pub2_path: impl Into<PathBuf>,
        user_query: impl Into<String>,
        run_stamp: RunStamp,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            run_stamp,
            pub1_path: pub1_path.into(),
            pub2_path: pub2_path.into(),
            user_query: user_query.into(),
            pub1_profile: None,
            pub2_profile: None,
            comparison: None,
            trends: None,
            summary: None,
            fact_check: None,
            extra_info: None,
            lnode: None,
            count: 0,
        }
    }

    /// Store a stage's output, set `lnode` and bump `count`.
    ///
    /// Fails if the owning stage is not the direct successor of `lnode`,
    /// which rules out skipped, repeated or reordered stages.
    pub fn record(mut self, output: StageOutput) -> Result<Self> {
        let stage = output.stage();
        self.expect_next(stage)?;

        match output {
            StageOutput::Pub1Profile(p) => self.pub1_profile = Some(p),
            StageOutput::Pub2Profile(p) => self.pub2_profile = Some(p),
            StageOutput::Comparison(s) => self.comparison = Some(s),
            StageOutput::Trends(s) => self.trends = Some(s),
            StageOutput::Summary(s) => self.summary = Some(s),
            StageOutput::FactCheck(s) => self.fact_check = Some(s),
            StageOutput::ExtraInfo(s) => self.extra_info = Some(s),
        }
        self.lnode = Some(stage);
        self.count += 1;
        Ok(self)
    }

    /// Check that `stage` is the next one to run on this context.
    pub fn expect_next(&self, stage: Stage) -> Result<()> {
        if stage.previous() == self.lnode {
            return Ok(());
        }
        let label = |s: Option<Stage>| s.map_or("start", |s| s.as_str()).to_string();
        Err(PubCompareError::StageOrder {
            stage: stage.to_string(),
            expected: label(stage.previous()),
            found: label(self.lnode),
        })
    }

    /// The stage that will run next, `None` once the pipeline is done.
    pub fn next_stage(&self) -> Option<Stage> {
        match self.lnode {
            None => Some(Stage::AnalyzePub1),
            Some(stage) => stage.next(),
        }
    }

    /// True once the terminal stage has run.
    pub fn is_done(&self) -> bool {
        self.lnode == Some(Stage::Enrich)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_stamp(&self) -> &RunStamp {
        &self.run_stamp
    }

    pub fn pub_path(&self, which: Publication) -> &Path {
        match which {
            Publication::First => &self.pub1_path,
            Publication::Second => &self.pub2_path,
        }
    }

    pub fn pub1_path(&self) -> &Path {
        &self.pub1_path
    }

    pub fn pub2_path(&self) -> &Path {
        &self.pub2_path
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn profile(&self, which: Publication) -> Option<&Profile> {
        match which {
            Publication::First => self.pub1_profile.as_ref(),
            Publication::Second => self.pub2_profile.as_ref(),
        }
    }

    pub fn pub1_profile(&self) -> Option<&Profile> {
        self.pub1_profile.as_ref()
    }

    pub fn pub2_profile(&self) -> Option<&Profile> {
        self.pub2_profile.as_ref()
    }

    pub fn comparison(&self) -> Option<&str> {
        self.comparison.as_deref()
    }

    pub fn trends(&self) -> Option<&str> {
        self.trends.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn fact_check(&self) -> Option<&str> {
        self.fact_check.as_deref()
    }

    pub fn extra_info(&self) -> Option<&str> {
        self.extra_info.as_deref()
    }

    pub fn lnode(&self) -> Option<Stage> {
        self.lnode
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Identity used in profile artifact names, e.g. `pub1_attention`.
    pub fn publication_id(&self, which: Publication) -> String {
        format!(
            "{}_{}",
            which.label(),
            publication_stem(self.pub_path(which))
        )
    }
}
