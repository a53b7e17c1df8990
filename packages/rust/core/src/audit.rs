//! Audit trail port.
//!
//! The pipeline reports what it ran and what it produced through [`AuditLog`]
//! instead of a process-wide logger, so callers decide where records go.

use std::sync::Mutex;

use serde_json::Value;

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// Sink for audit records: a named event plus structured detail.
pub trait AuditLog: Send + Sync {
    fn record(&self, level: AuditLevel, event: &str, detail: &Value);

    fn info(&self, event: &str, detail: &Value) {
        self.record(AuditLevel::Info, event, detail);
    }

    fn warn(&self, event: &str, detail: &Value) {
        self.record(AuditLevel::Warn, event, detail);
    }

    fn error(&self, event: &str, detail: &Value) {
        self.record(AuditLevel::Error, event, detail);
    }

    /// Push buffered records to their destination.
    fn flush(&self) {}
}

/// Forwards audit records to `tracing` under the `pubcompare::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, level: AuditLevel, event: &str, detail: &Value) {
        match level {
            AuditLevel::Info => tracing::info!(target: "pubcompare::audit", event, %detail),
            AuditLevel::Warn => tracing::warn!(target: "pubcompare::audit", event, %detail),
            AuditLevel::Error => tracing::error!(target: "pubcompare::audit", event, %detail),
        }
    }
}

/// A captured audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub level: AuditLevel,
    pub event: String,
    pub detail: Value,
}

/// Keeps records in memory; used by tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Records with the given event name.
    pub fn find(&self, event: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event == event)
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, level: AuditLevel, event: &str, detail: &Value) {
        if let Ok(mut records) = self.records.lock() {
            records.push(AuditRecord {
                level,
                event: event.to_string(),
                detail: detail.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_log_captures_levels() {
        let log = MemoryAuditLog::new();
        log.info("stage_completed", &json!({"stage": "compare"}));
        log.error("run_failed", &json!({"error": "boom"}));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, AuditLevel::Info);
        assert_eq!(records[1].level, AuditLevel::Error);
        assert_eq!(log.find("run_failed")[0].detail["error"], "boom");
    }

    #[test]
    fn tracing_log_does_not_panic_without_subscriber() {
        TracingAuditLog.warn("profile_save_failed", &json!({"path": "/x"}));
        TracingAuditLog.flush();
    }
}
