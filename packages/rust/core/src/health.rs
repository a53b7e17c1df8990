//! Startup health check: required directories and API keys.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use pubcompare_artifacts::{COMPARISONS_DIR, PROFILES_DIR};
use pubcompare_shared::{AppConfig, PubCompareError, Result, api_key_from_env};

/// Findings of [`health_check`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// Directories checked, in order.
    pub checked_dirs: Vec<PathBuf>,
    /// Required directories that do not exist.
    pub missing_dirs: Vec<PathBuf>,
    /// Non-fatal problems such as an unset API key.
    pub warnings: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_dirs.is_empty()
    }
}

/// Directories a run reads from or writes to.
pub fn required_dirs(config: &AppConfig) -> Vec<PathBuf> {
    let output = Path::new(&config.defaults.output_dir);
    vec![
        PathBuf::from(&config.defaults.publications_dir),
        output.join(PROFILES_DIR),
        output.join(COMPARISONS_DIR),
        PathBuf::from(&config.logging.logs_dir),
    ]
}

/// Check directories and API keys. Missing keys are warnings only.
pub fn health_check(config: &AppConfig) -> HealthReport {
    let checked_dirs = required_dirs(config);
    let missing_dirs: Vec<PathBuf> = checked_dirs.iter().filter(|d| !d.is_dir()).cloned().collect();

    let mut warnings = Vec::new();
    for (service, var) in [
        ("OpenAI", &config.openai.api_key_env),
        ("Tavily", &config.tavily.api_key_env),
    ] {
        if api_key_from_env(var).is_none() {
            warnings.push(format!("{service} API key is not set ({var})"));
        }
    }

    for dir in &missing_dirs {
        warn!(dir = %dir.display(), "required directory missing");
    }
    for warning in &warnings {
        warn!("{warning}");
    }

    HealthReport {
        checked_dirs,
        missing_dirs,
        warnings,
    }
}

/// Create every missing directory in `report`. Returns the directories created.
pub fn create_missing(report: &HealthReport) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for dir in &report.missing_dirs {
        std::fs::create_dir_all(dir).map_err(|e| PubCompareError::io(dir, e))?;
        info!(dir = %dir.display(), "created directory");
        created.push(dir.clone());
    }
    Ok(created)
}
