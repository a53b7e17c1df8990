//! Application configuration for pubcompare.
//!
//! User config lives at `~/.pubcompare/pubcompare.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PubCompareError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pubcompare.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pubcompare";

// ---------------------------------------------------------------------------
// Config structs (matching pubcompare.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenAI-compatible chat completion endpoint.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Tavily web search.
    #[serde(default)]
    pub tavily: TavilyConfig,

    /// Enrichment agent limits.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Log file sinks.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the `.txt` publications to choose from.
    #[serde(default = "default_publications_dir")]
    pub publications_dir: String,

    /// Root for `profiles/` and `comparisons/`.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-stage deadline in seconds.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Character budget when reading a publication.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Characters of each publication handed to the enrichment agent.
    #[serde(default = "default_excerpt_chars")]
    pub enrichment_excerpt_chars: usize,

    /// Fail the analyze stages when extraction output is not JSON.
    #[serde(default)]
    pub require_structured_profiles: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            publications_dir: default_publications_dir(),
            output_dir: default_output_dir(),
            stage_timeout_secs: default_stage_timeout_secs(),
            max_chars: default_max_chars(),
            enrichment_excerpt_chars: default_excerpt_chars(),
            require_structured_profiles: false,
        }
    }
}

fn default_publications_dir() -> String {
    "data/sample_publications".into()
}
fn default_output_dir() -> String {
    "outputs".into()
}
fn default_stage_timeout_secs() -> u64 {
    30
}
fn default_max_chars() -> usize {
    12_000
}
fn default_excerpt_chars() -> usize {
    3_000
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Chat model to use for every stage.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API base, `/chat/completions` is appended.
    #[serde(default = "default_openai_base_url")]
    pub base_url: Url,

    #[serde(default)]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
            temperature: 0.0,
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_openai_base_url() -> Url {
    Url::parse("https://api.openai.com/v1/").expect("valid default OpenAI URL")
}

/// `[tavily]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_tavily_base_url")]
    pub base_url: Url,

    /// Results returned per search.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_tavily_key_env(),
            base_url: default_tavily_base_url(),
            max_results: default_max_results(),
        }
    }
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_tavily_base_url() -> Url {
    Url::parse("https://api.tavily.com/").expect("valid default Tavily URL")
}
fn default_max_results() -> u32 {
    5
}

/// `[agent]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Reason/act iterations before the agent gives up.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    6
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for `pipeline.log` and `errors.log`.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Rotated `pipeline.log` files to keep (one per day).
    #[serde(default = "default_pipeline_retention")]
    pub pipeline_retention: usize,

    /// Rotated `errors.log` files to keep (one per day).
    #[serde(default = "default_error_retention")]
    pub error_retention: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            pipeline_retention: default_pipeline_retention(),
            error_retention: default_error_retention(),
        }
    }
}

fn default_logs_dir() -> String {
    "logs".into()
}
fn default_pipeline_retention() -> usize {
    30
}
fn default_error_retention() -> usize {
    14
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Deadline applied to each stage's port call.
    pub stage_timeout: Duration,
    /// Character budget for document reads.
    pub max_chars: usize,
    /// Characters of each publication handed to the enrichment agent.
    pub excerpt_chars: usize,
    /// Reject unstructured extraction output instead of passing it on.
    pub require_structured_profiles: bool,
    /// Root for run artifacts.
    pub output_dir: PathBuf,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            stage_timeout: Duration::from_secs(config.defaults.stage_timeout_secs),
            max_chars: config.defaults.max_chars,
            excerpt_chars: config.defaults.enrichment_excerpt_chars,
            require_structured_profiles: config.defaults.require_structured_profiles,
            output_dir: PathBuf::from(&config.defaults.output_dir),
        }
    }
}

impl RunConfig {
    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.stage_timeout.is_zero() {
            return Err(PubCompareError::config("stage timeout must be positive"));
        }
        if self.max_chars == 0 {
            return Err(PubCompareError::config("max_chars must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pubcompare/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PubCompareError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pubcompare/pubcompare.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PubCompareError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PubCompareError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PubCompareError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PubCompareError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PubCompareError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the key held in `var_name`, if set and non-empty.
pub fn api_key_from_env(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

/// Check that the OpenAI API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    api_key_from_env(var_name).ok_or_else(|| {
        PubCompareError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))
    })
}

/// Mask the middle of a key for display, keeping `visible` chars at each end.
pub fn mask_api_key(key: &str, visible: usize) -> String {
    let len = key.chars().count();
    if len <= 2 * visible {
        return "*".repeat(len);
    }
    let head: String = key.chars().take(visible).collect();
    let tail: String = key.chars().skip(len - visible).collect();
    format!("{head}{}{tail}", "*".repeat(len - 2 * visible))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("TAVILY_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.stage_timeout_secs, 30);
        assert_eq!(parsed.defaults.max_chars, 12_000);
        assert_eq!(parsed.openai.model, "gpt-3.5-turbo");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
output_dir = "/tmp/out"
require_structured_profiles = true

[openai]
model = "gpt-4o-mini"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir, "/tmp/out");
        assert!(config.defaults.require_structured_profiles);
        assert_eq!(config.defaults.stage_timeout_secs, 30);
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.agent.max_iterations, 6);
    }

    #[test]
    fn run_config_from_app_config() {
        let run = RunConfig::from(&AppConfig::default());
        assert_eq!(run.stage_timeout, Duration::from_secs(30));
        assert_eq!(run.excerpt_chars, 3_000);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut run = RunConfig::from(&AppConfig::default());
        run.stage_timeout = Duration::ZERO;
        assert!(run.validate().unwrap_err().to_string().contains("positive"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openai.api_key_env = "PUBCOMPARE_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn mask_keeps_ends() {
        assert_eq!(mask_api_key("sk-abcdefghij12345", 5), "sk-ab********12345");
        assert_eq!(mask_api_key("short", 5), "*****");
    }
}
