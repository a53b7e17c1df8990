//! Run artifact writer.
//!
//! Layout under the output root:
//! ```text
//! <output_root>/
//! ├── profiles/
//! │   └── validated_profile_<pub_id>_<stamp>.json
//! └── comparisons/
//!     ├── comparison_<stem1>_vs_<stem2>_<stamp>.json
//!     └── comparison_<stem1>_vs_<stem2>_<stamp>.html
//! ```
//!
//! Names are derived from the run stamp and publication identity only, so
//! writing the same artifact twice replaces the file.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use pubcompare_shared::{
    Profile, PubCompareError, Publication, Result, RunStamp, StepContext, ValidatedProfile,
    clean_filename, publication_stem,
};

use crate::report::render_report;

/// Subdirectory for validated profiles.
pub const PROFILES_DIR: &str = "profiles";

/// Subdirectory for comparison snapshots and reports.
pub const COMPARISONS_DIR: &str = "comparisons";

/// Metadata for a single written artifact.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArtifactMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// One artifact that could not be written.
#[derive(Debug, Clone)]
pub struct SaveFailure {
    /// What was being written (`pub1 profile`, `comparison json`, ...).
    pub artifact: String,
    pub error: String,
}

/// Outcome of [`ArtifactWriter::write_run`]. Failures are reported, not raised.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    pub written: Vec<ArtifactMeta>,
    pub failures: Vec<SaveFailure>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, artifact: &str, result: Result<ArtifactMeta>) {
        match result {
            Ok(meta) => self.written.push(meta),
            Err(e) => {
                warn!(artifact, error = %e, "failed to save artifact");
                self.failures.push(SaveFailure {
                    artifact: artifact.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Writes profiles, comparison snapshots and HTML reports.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.output_root.join(PROFILES_DIR)
    }

    pub fn comparisons_dir(&self) -> PathBuf {
        self.output_root.join(COMPARISONS_DIR)
    }

    /// Create `profiles/` and `comparisons/` if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.profiles_dir(), self.comparisons_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| PubCompareError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Path of the profile artifact for `pub_id` in the run stamped `stamp`.
    pub fn profile_path(&self, pub_id: &str, stamp: &RunStamp) -> PathBuf {
        self.profiles_dir().join(format!(
            "validated_profile_{}_{stamp}.json",
            clean_filename(pub_id)
        ))
    }

    /// Path of the comparison artifacts without extension.
    pub fn comparison_base(&self, ctx: &StepContext) -> PathBuf {
        self.comparisons_dir().join(format!(
            "comparison_{}_vs_{}_{}",
            publication_stem(ctx.pub1_path()),
            publication_stem(ctx.pub2_path()),
            ctx.run_stamp()
        ))
    }

    /// Persist one validated profile as pretty-printed JSON.
    #[instrument(skip(self, profile))]
    pub fn write_profile(
        &self,
        profile: &ValidatedProfile,
        pub_id: &str,
        stamp: &RunStamp,
    ) -> Result<ArtifactMeta> {
        let path = self.profile_path(pub_id, stamp);
        ensure_parent(&path)?;
        let meta = write_atomic(&path, &to_pretty_json(profile)?)?;
        info!(path = %meta.path.display(), "saved validated profile");
        Ok(meta)
    }

    /// Write every artifact for a run.
    ///
    /// Structured profiles are (re)written under the run's names, followed by
    /// the full context snapshot and the HTML report. Nothing here is fatal:
    /// each failure is logged and collected in the report.
    #[instrument(skip_all, fields(run_id = %ctx.run_id()))]
    pub fn write_run(&self, ctx: &StepContext) -> SaveReport {
        let mut report = SaveReport::default();

        for which in [Publication::First, Publication::Second] {
            match ctx.profile(which) {
                Some(Profile::Structured(profile)) => {
                    let pub_id = ctx.publication_id(which);
                    let result = self.write_profile(profile, &pub_id, ctx.run_stamp());
                    report.record(&format!("{} profile", which.label()), result);
                }
                Some(Profile::Raw(_)) => {
                    debug!(publication = which.label(), "raw profile kept in snapshot only");
                }
                None => {}
            }
        }

        let base = self.comparison_base(ctx);
        let json_path = base.with_extension("json");
        let html_path = base.with_extension("html");

        let json = ensure_parent(&json_path)
            .and_then(|()| to_pretty_json(ctx))
            .and_then(|content| write_atomic(&json_path, &content));
        report.record("comparison json", json);

        let html = write_atomic(&html_path, &render_report(ctx));
        report.record("comparison html", html);

        info!(
            written = report.written.len(),
            failed = report.failures.len(),
            "run artifacts saved"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PubCompareError::io(parent, e))?;
    }
    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| PubCompareError::Persistence(format!("JSON serialization failed: {e}")))
}

/// Write to a temp file beside `path`, then rename over it.
fn write_atomic(path: &Path, content: &str) -> Result<ArtifactMeta> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| PubCompareError::Persistence(format!("no file name in {path:?}")))?;
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| PubCompareError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| PubCompareError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());

    debug!(path = %path.display(), size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        path: path.to_path_buf(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len(),
    })
}
