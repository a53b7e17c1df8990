//! CLI command definitions and routing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use pubcompare_artifacts::{ArtifactWriter, SaveReport};
use pubcompare_core::{
    ComparisonRequest, FsDocumentSource, Pipeline, Ports, ProgressReporter, QUERY_PRESETS,
    ReactAgent, create_missing, health_check, list_publications,
};
use pubcompare_providers::{OpenAiChatModel, TavilySearch};
use pubcompare_shared::{
    AppConfig, GenerativeModel, PubCompareError, RunConfig, Stage, StepContext, api_key_from_env,
    init_config, mask_api_key, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pubcompare: compare two scientific publications with an LLM pipeline.
#[derive(Parser)]
#[command(
    name = "pubcompare",
    version,
    about = "Compare two scientific publications: profiles, comparison, trends, summary, fact check and enrichment.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Console log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Compare two publications.
    Compare {
        /// First publication (file name in the publications directory, or a path).
        pub1: String,

        /// Second publication.
        pub2: String,

        /// Comparison lens: a preset such as "Tool Usage", or any custom question.
        #[arg(short, long, default_value = "Tool Usage")]
        query: String,

        /// Publications directory (defaults to config).
        #[arg(long)]
        dir: Option<String>,

        /// Output root for profiles and comparisons (defaults to config).
        #[arg(short, long)]
        out: Option<String>,

        /// Per-stage deadline in seconds (defaults to config).
        #[arg(long)]
        timeout: Option<u64>,

        /// Fail when a profile cannot be parsed as JSON.
        #[arg(long)]
        strict: bool,
    },

    /// List available publications and query presets.
    List {
        /// Publications directory (defaults to config).
        #[arg(long)]
        dir: Option<String>,
    },

    /// Check required directories and API keys.
    Health {
        /// Create missing directories.
        #[arg(long)]
        fix: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command {
        Command::Compare {
            pub1,
            pub2,
            query,
            dir,
            out,
            timeout,
            strict,
        } => {
            let request = ComparisonRequest::new(pub1, pub2, query);
            let overrides = Overrides {
                dir,
                out,
                timeout,
                strict,
            };
            cmd_compare(&config, request, overrides).await
        }
        Command::List { dir } => cmd_list(&config, dir.as_deref()),
        Command::Health { fix } => cmd_health(&config, fix),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

struct Overrides {
    dir: Option<String>,
    out: Option<String>,
    timeout: Option<u64>,
    strict: bool,
}

impl Overrides {
    fn apply(&self, mut run_config: RunConfig) -> RunConfig {
        if let Some(out) = &self.out {
            run_config.output_dir = out.into();
        }
        if let Some(secs) = self.timeout {
            run_config.stage_timeout = Duration::from_secs(secs);
        }
        run_config.require_structured_profiles |= self.strict;
        run_config
    }
}

async fn cmd_compare(
    config: &AppConfig,
    request: ComparisonRequest,
    overrides: Overrides,
) -> Result<()> {
    // Reject bad input before touching the network.
    request.validate()?;
    let api_key = validate_api_key(config)?;
    let run_config = overrides.apply(RunConfig::from(config));

    let dir = overrides
        .dir
        .as_deref()
        .unwrap_or(&config.defaults.publications_dir);
    let preset = request.is_preset();
    let ctx = request.into_context(Path::new(dir))?;
    for path in [ctx.pub1_path(), ctx.pub2_path()] {
        if !path.is_file() {
            return Err(eyre!("publication not found: {}", path.display()));
        }
    }

    let chat = OpenAiChatModel::new(&config.openai, api_key);
    info!(model = chat.model(), "using chat model");
    let model: Arc<dyn GenerativeModel> = Arc::new(chat);
    let mut agent = ReactAgent::new(Arc::clone(&model), config.agent.max_iterations);
    match api_key_from_env(&config.tavily.api_key_env) {
        Some(key) => agent = agent.with_search(Arc::new(TavilySearch::new(&config.tavily, key))),
        None => warn!(
            var = %config.tavily.api_key_env,
            "web search key not set, enrichment runs without WebSearch"
        ),
    }

    let ports = Ports {
        model,
        agent: Arc::new(agent),
        documents: Arc::new(FsDocumentSource::new(run_config.max_chars)),
    };
    let pipeline = Pipeline::new(ports, run_config)?;

    info!(
        pub1 = %ctx.pub1_path().display(),
        pub2 = %ctx.pub2_path().display(),
        query = ctx.user_query(),
        preset,
        stage_timeout_secs = pipeline.config().stage_timeout.as_secs(),
        "comparing publications"
    );

    let reporter = CliProgress::new();
    let ctx = pipeline.run(ctx, &reporter).await?;

    println!("{}", render_results(&ctx));

    let report = ArtifactWriter::new(&pipeline.config().output_dir).write_run(&ctx);
    print!("{}", render_save_report(&report));

    Ok(())
}

/// Human-readable result block. Empty outputs show a placeholder.
fn render_results(ctx: &StepContext) -> String {
    let sections = [
        ("Summary", ctx.summary(), "[No summary]"),
        ("Fact Check", ctx.fact_check(), "[No fact check]"),
        ("Enrichment", ctx.extra_info(), "[No enrichment]"),
    ];

    let mut out = format!("\n  Query: {}\n", ctx.user_query());
    for (title, text, placeholder) in sections {
        let text = text.filter(|t| !t.trim().is_empty()).unwrap_or(placeholder);
        out.push_str(&format!("\n== {title} ==\n{}\n", text.trim()));
    }
    out
}

fn render_save_report(report: &SaveReport) -> String {
    let mut out = String::from("\n");
    for meta in &report.written {
        let name = meta
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(&format!("  Saved: {name} ({} bytes)\n", meta.size_bytes));
    }
    for failure in &report.failures {
        out.push_str(&format!(
            "  Warning: could not save {}: {}\n",
            failure.artifact, failure.error
        ));
    }
    out
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage, position: usize, total: usize) {
        self.spinner
            .set_message(format!("[{position}/{total}] {}", stage_label(stage)));
    }

    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        self.spinner.println(format!(
            "  done  {} ({:.1}s)",
            stage_label(stage),
            elapsed.as_secs_f64()
        ));
    }

    fn stage_failed(&self, stage: Stage, error: &PubCompareError) {
        self.spinner
            .abandon_with_message(format!("{} failed: {error}", stage_label(stage)));
    }

    fn done(&self, _ctx: &StepContext) {
        self.spinner.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::AnalyzePub1 => "Analyzing publication 1",
        Stage::AnalyzePub2 => "Analyzing publication 2",
        Stage::Compare => "Comparing",
        Stage::AggregateTrends => "Aggregating trends",
        Stage::Summarize => "Summarizing",
        Stage::FactCheck => "Fact-checking",
        Stage::Enrich => "Enriching",
    }
}

// ---------------------------------------------------------------------------
// list / health / config
// ---------------------------------------------------------------------------

fn cmd_list(config: &AppConfig, dir: Option<&str>) -> Result<()> {
    let dir = dir.unwrap_or(&config.defaults.publications_dir);
    let names = list_publications(Path::new(dir))?;

    println!("Publications in {dir}:");
    if names.is_empty() {
        println!("  (none)");
    }
    for name in &names {
        println!("  {name}");
    }

    println!("\nQuery presets:");
    for preset in QUERY_PRESETS {
        println!("  {preset}");
    }
    Ok(())
}

fn cmd_health(config: &AppConfig, fix: bool) -> Result<()> {
    let report = health_check(config);

    for dir in &report.checked_dirs {
        let mark = if report.missing_dirs.contains(dir) { "missing" } else { "ok" };
        println!("  {mark:<8}{}", dir.display());
    }
    for warning in &report.warnings {
        println!("  warning {warning}");
    }

    if report.is_healthy() {
        println!("\nAll required directories present.");
        return Ok(());
    }
    if fix {
        let created = create_missing(&report)?;
        println!("\nCreated {} missing directories.", created.len());
        return Ok(());
    }
    Err(eyre!(
        "{} required directories missing; run `pubcompare health --fix`",
        report.missing_dirs.len()
    ))
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");

    for (service, var) in [
        ("OpenAI", &config.openai.api_key_env),
        ("Tavily", &config.tavily.api_key_env),
    ] {
        let shown = api_key_from_env(var)
            .map(|key| mask_api_key(&key, 4))
            .unwrap_or_else(|| "(not set)".into());
        println!("# {service} key ({var}): {shown}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pubcompare_artifacts::{ArtifactMeta, SaveFailure};
    use pubcompare_shared::StageOutput;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_defaults_to_tool_usage() {
        let cli = Cli::try_parse_from(["pubcompare", "compare", "a.txt", "b.txt"]).unwrap();
        match cli.command {
            Command::Compare { query, strict, .. } => {
                assert_eq!(query, "Tool Usage");
                assert!(!strict);
            }
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let overrides = Overrides {
            dir: None,
            out: Some("elsewhere".into()),
            timeout: Some(5),
            strict: true,
        };
        let run_config = overrides.apply(RunConfig::from(&AppConfig::default()));
        assert_eq!(run_config.output_dir, Path::new("elsewhere"));
        assert_eq!(run_config.stage_timeout, Duration::from_secs(5));
        assert!(run_config.require_structured_profiles);
    }

    #[test]
    fn results_use_placeholders() {
        let ctx = StepContext::new("a.txt", "b.txt", "Datasets")
            .record(StageOutput::Pub1Profile(pubcompare_shared::Profile::Raw("x".into())))
            .unwrap()
            .record(StageOutput::Pub2Profile(pubcompare_shared::Profile::Raw("y".into())))
            .unwrap()
            .record(StageOutput::Comparison("c".into()))
            .unwrap()
            .record(StageOutput::Trends("t".into()))
            .unwrap()
            .record(StageOutput::Summary("Both use GLUE.".into()))
            .unwrap();

        let text = render_results(&ctx);
        assert!(text.contains("== Summary ==\nBoth use GLUE."));
        assert!(text.contains("[No fact check]"));
        assert!(text.contains("[No enrichment]"));
    }

    #[test]
    fn save_failures_are_warnings() {
        let report = SaveReport {
            written: vec![ArtifactMeta {
                path: "outputs/comparisons/comparison_a_vs_b_20250101_000000.json".into(),
                sha256: "00".into(),
                size_bytes: 12,
            }],
            failures: vec![SaveFailure {
                artifact: "comparison html".into(),
                error: "permission denied".into(),
            }],
        };
        let text = render_save_report(&report);
        assert!(text.contains("Saved: comparison_a_vs_b_20250101_000000.json (12 bytes)"));
        assert!(text.contains("Warning: could not save comparison html: permission denied"));
    }
}
