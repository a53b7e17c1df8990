//! Comparison pipeline for pubcompare.
//!
//! Schema validation, stage deadlines, the seven-stage pipeline, the ReAct
//! enrichment agent and the audit-log port.

pub mod agent;
pub mod audit;
pub mod deadline;
pub mod documents;
pub mod health;
pub mod pipeline;
pub mod prompts;
pub mod selection;
pub mod validator;

#[cfg(test)]
mod testing;

pub use agent::{AGENT_STOPPED, AgentTool, KeywordTagExtractor, RagRetriever, ReactAgent, WebSearch};
pub use audit::{AuditLevel, AuditLog, AuditRecord, MemoryAuditLog, TracingAuditLog};
pub use deadline::{TimedOut, invoke_with_deadline, invoke_with_deadline_blocking};
pub use documents::{FsDocumentSource, list_publications, publication_path};
pub use health::{HealthReport, create_missing, health_check};
pub use pipeline::{Pipeline, Ports, ProgressReporter, SilentProgress};
pub use selection::{ComparisonRequest, QUERY_PRESETS};
pub use validator::{SchemaValidator, Validation, ValidationOutcome, validate_profile};
