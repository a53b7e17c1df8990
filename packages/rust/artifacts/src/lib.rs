//! Persistence of run outputs: validated profiles, comparison snapshots and
//! the rendered HTML report.

pub mod report;
pub mod writer;

pub use report::{escape_html, render_report};
pub use writer::{
    ArtifactMeta, ArtifactWriter, COMPARISONS_DIR, PROFILES_DIR, SaveFailure, SaveReport,
};
