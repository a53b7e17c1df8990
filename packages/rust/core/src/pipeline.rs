//! The comparison pipeline: seven fixed stages over a [`StepContext`].
//!
//! `analyze_pub1 → analyze_pub2 → compare → aggregate_trends → summarize →
//! fact_check → react_agent_tool`
//!
//! Every stage runs its port call under the stage deadline. A timeout or port
//! error ends the run; nothing is retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument};

use pubcompare_artifacts::ArtifactWriter;
use pubcompare_shared::{
    DocumentSource, EnrichmentAgent, GenerativeModel, Profile, PubCompareError, Publication,
    Result, RunConfig, Stage, StageOutput, StepContext,
};

use crate::audit::{AuditLog, TracingAuditLog};
use crate::deadline::{TimedOut, invoke_with_deadline};
use crate::documents::truncate_chars;
use crate::prompts;
use crate::validator::SchemaValidator;

/// External collaborators the stages call.
#[derive(Clone)]
pub struct Ports {
    pub model: Arc<dyn GenerativeModel>,
    pub agent: Arc<dyn EnrichmentAgent>,
    pub documents: Arc<dyn DocumentSource>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage runs. `position` is one-based.
    fn stage_started(&self, stage: Stage, position: usize, total: usize);
    fn stage_finished(&self, stage: Stage, elapsed: Duration);
    fn stage_failed(&self, stage: Stage, error: &PubCompareError);
    /// Called when the last stage has run.
    fn done(&self, ctx: &StepContext);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: Stage, _position: usize, _total: usize) {}
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
    fn stage_failed(&self, _stage: Stage, _error: &PubCompareError) {}
    fn done(&self, _ctx: &StepContext) {}
}

/// Runs the stage sequence. Holds no per-run state, one instance can serve
/// any number of runs.
pub struct Pipeline {
    ports: Ports,
    config: RunConfig,
    audit: Arc<dyn AuditLog>,
    profile_writer: Option<ArtifactWriter>,
}

impl Pipeline {
    /// Build a pipeline. Validated profiles are persisted under
    /// `config.output_dir`.
    pub fn new(ports: Ports, config: RunConfig) -> Result<Self> {
        config.validate()?;
        let profile_writer = Some(ArtifactWriter::new(&config.output_dir));
        Ok(Self {
            ports,
            config,
            audit: Arc::new(TracingAuditLog),
            profile_writer,
        })
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Keep validated profiles in memory only.
    pub fn without_profile_persistence(mut self) -> Self {
        self.profile_writer = None;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every remaining stage on `ctx` and return the finished context.
    #[instrument(skip_all, fields(run_id = %ctx.run_id(), query = %ctx.user_query()))]
    pub async fn run(
        &self,
        ctx: StepContext,
        progress: &dyn ProgressReporter,
    ) -> Result<StepContext> {
        let start = Instant::now();
        let total = Stage::ORDER.len();
        let mut ctx = ctx;

        info!(
            pub1 = %ctx.pub1_path().display(),
            pub2 = %ctx.pub2_path().display(),
            "starting comparison pipeline"
        );
        self.audit.info(
            "run_started",
            &json!({
                "run_id": ctx.run_id(),
                "pub1_path": ctx.pub1_path(),
                "pub2_path": ctx.pub2_path(),
                "user_query": ctx.user_query(),
            }),
        );

        while let Some(stage) = ctx.next_stage() {
            progress.stage_started(stage, stage.index() + 1, total);
            let stage_start = Instant::now();
            let (lnode, count) = (ctx.lnode(), ctx.count());

            match self.run_stage(stage, ctx).await {
                Ok(next) => {
                    ctx = next;
                    progress.stage_finished(stage, stage_start.elapsed());
                }
                Err(e) => {
                    error!(stage = %stage, error = %e, count, "pipeline run failed");
                    self.audit.error(
                        "run_failed",
                        &json!({
                            "stage": stage,
                            "lnode": lnode,
                            "count": count,
                            "timeout": e.is_timeout(),
                            "error": e.to_string(),
                        }),
                    );
                    self.audit.flush();
                    progress.stage_failed(stage, &e);
                    return Err(e);
                }
            }
        }

        let elapsed = start.elapsed();
        info!(count = ctx.count(), elapsed_ms = elapsed.as_millis() as u64, "pipeline complete");
        self.audit.info(
            "run_completed",
            &json!({ "count": ctx.count(), "elapsed_ms": elapsed.as_millis() as u64 }),
        );
        self.audit.flush();
        progress.done(&ctx);

        Ok(ctx)
    }

    /// Run one stage and return the successor context.
    ///
    /// Fails without calling any port if `stage` is not next in line.
    pub async fn run_stage(&self, stage: Stage, ctx: StepContext) -> Result<StepContext> {
        ctx.expect_next(stage)?;
        let started = Instant::now();

        let output = match stage {
            Stage::AnalyzePub1 => StageOutput::Pub1Profile(self.analyze(&ctx, Publication::First).await?),
            Stage::AnalyzePub2 => {
                StageOutput::Pub2Profile(self.analyze(&ctx, Publication::Second).await?)
            }
            Stage::Compare => StageOutput::Comparison(self.compare(&ctx).await?),
            Stage::AggregateTrends => StageOutput::Trends(self.aggregate_trends(&ctx).await?),
            Stage::Summarize => StageOutput::Summary(self.summarize(&ctx).await?),
            Stage::FactCheck => StageOutput::FactCheck(self.fact_check(&ctx).await?),
            Stage::Enrich => StageOutput::ExtraInfo(self.enrich(&ctx).await?),
        };

        let ctx = ctx.record(output)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(stage = %stage, count = ctx.count(), elapsed_ms, "stage complete");
        self.audit.info(
            "stage_completed",
            &json!({ "stage": stage, "count": ctx.count(), "elapsed_ms": elapsed_ms }),
        );
        Ok(ctx)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn analyze(&self, ctx: &StepContext, which: Publication) -> Result<Profile> {
        let stage = which.analyze_stage();
        let text = self.ports.documents.read(ctx.pub_path(which))?;
        let raw = self.complete(stage, prompts::profile_extraction(&text)).await?;

        let validator = SchemaValidator::new(self.profile_writer.clone(), Arc::clone(&self.audit));
        let validation = validator.validate(&raw, &ctx.publication_id(which), ctx.run_stamp());

        if self.config.require_structured_profiles && !validation.profile.is_structured() {
            return Err(PubCompareError::UnparseableOutput {
                stage: stage.to_string(),
            });
        }
        Ok(validation.profile)
    }

    async fn compare(&self, ctx: &StepContext) -> Result<String> {
        let (pub1, pub2) = profiles(ctx, Stage::Compare)?;
        let prompt = prompts::comparison(ctx.user_query(), pub1, pub2);
        self.complete(Stage::Compare, prompt).await
    }

    async fn aggregate_trends(&self, ctx: &StepContext) -> Result<String> {
        let (pub1, pub2) = profiles(ctx, Stage::AggregateTrends)?;
        let prompt = prompts::trends(ctx.user_query(), pub1, pub2);
        self.complete(Stage::AggregateTrends, prompt).await
    }

    async fn summarize(&self, ctx: &StepContext) -> Result<String> {
        let comparison = upstream(ctx.comparison(), Stage::Summarize, "comparison")?;
        let trends = upstream(ctx.trends(), Stage::Summarize, "trends")?;
        self.complete(Stage::Summarize, prompts::summary(comparison, trends))
            .await
    }

    async fn fact_check(&self, ctx: &StepContext) -> Result<String> {
        let comparison = upstream(ctx.comparison(), Stage::FactCheck, "comparison")?;
        let trends = upstream(ctx.trends(), Stage::FactCheck, "trends")?;
        let summary = upstream(ctx.summary(), Stage::FactCheck, "summary")?;
        let pub1 = self.ports.documents.read(ctx.pub1_path())?;
        let pub2 = self.ports.documents.read(ctx.pub2_path())?;

        let prompt = prompts::fact_check(comparison, trends, summary, &pub1, &pub2);
        self.complete(Stage::FactCheck, prompt).await
    }

    async fn enrich(&self, ctx: &StepContext) -> Result<String> {
        let pub1 = self.ports.documents.read(ctx.pub1_path())?;
        let pub2 = self.ports.documents.read(ctx.pub2_path())?;
        let instruction = prompts::enrichment(
            ctx.user_query(),
            &truncate_chars(&pub1, self.config.excerpt_chars),
            &truncate_chars(&pub2, self.config.excerpt_chars),
        );

        let agent = Arc::clone(&self.ports.agent);
        debug!(instruction_chars = instruction.len(), "handing off to enrichment agent");
        invoke_with_deadline(self.config.stage_timeout, move |deadline| {
            agent.run(&instruction, &deadline)
        })
        .await
        .map_err(|t| timeout_error(Stage::Enrich, t))?
    }

    /// One model call under the stage deadline.
    async fn complete(&self, stage: Stage, prompt: String) -> Result<String> {
        debug!(
            stage = %stage,
            prompt_sha256 = %prompt_digest(&prompt),
            prompt_chars = prompt.len(),
            "calling generative model"
        );
        let model = Arc::clone(&self.ports.model);
        invoke_with_deadline(self.config.stage_timeout, move |_| model.complete(&prompt))
            .await
            .map_err(|t| timeout_error(stage, t))?
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn timeout_error(stage: Stage, t: TimedOut) -> PubCompareError {
    PubCompareError::StageTimeout {
        stage: stage.to_string(),
        limit: t.limit,
    }
}

fn profiles(ctx: &StepContext, stage: Stage) -> Result<(&Profile, &Profile)> {
    Ok((
        upstream(ctx.pub1_profile(), stage, "pub1_profile")?,
        upstream(ctx.pub2_profile(), stage, "pub2_profile")?,
    ))
}

/// An upstream field that the stage order guarantees is set.
fn upstream<'a, T: ?Sized>(value: Option<&'a T>, stage: Stage, field: &str) -> Result<&'a T> {
    value.ok_or_else(|| {
        PubCompareError::validation(format!("stage `{stage}` requires `{field}` to be set"))
    })
}

/// Short SHA-256 of a prompt, for correlating log lines with audit records.
fn prompt_digest(prompt: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(prompt.as_bytes()));
    digest[..16].to_string()
}
