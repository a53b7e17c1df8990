//! Shared types, error model, ports and configuration for pubcompare.
//!
//! This crate is the foundation depended on by all other pubcompare crates.
//! It provides:
//! - [`PubCompareError`], the unified error type
//! - Domain types ([`StepContext`], [`Profile`], [`ValidatedProfile`], [`Stage`])
//! - Port traits for the model, search tool, agent and document source
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AgentConfig, AppConfig, DefaultsConfig, LoggingConfig, OpenAiConfig, RunConfig, TavilyConfig,
    api_key_from_env, config_dir, config_file_path, init_config, load_config, load_config_from,
    mask_api_key, validate_api_key,
};
pub use error::{PubCompareError, Result};
pub use ports::{Deadline, DocumentSource, EnrichmentAgent, GenerativeModel, SearchTool};
pub use types::{
    Profile, Publication, RUN_STAMP_FORMAT, RunStamp, Stage, StageOutput, StepContext,
    ValidatedProfile, clean_filename, publication_stem,
};
