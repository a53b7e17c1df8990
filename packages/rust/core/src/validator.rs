//! Schema validation for profile extraction output.
//!
//! [`validate_profile`] is total: any text yields either a [`Profile::Structured`]
//! with all five fields present, or the input unchanged as [`Profile::Raw`] when
//! no JSON object can be found in it at all. Callers branch on the variant.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use pubcompare_artifacts::ArtifactWriter;
use pubcompare_shared::{Profile, RunStamp, ValidatedProfile};

use crate::audit::AuditLog;

/// How the raw text was turned into a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every field present with the expected shape.
    Intact,
    /// Parsed, but some fields were missing or had to be coerced to lists of strings.
    Repaired {
        missing: Vec<&'static str>,
        coerced: Vec<&'static str>,
    },
    /// Not a JSON object; the raw text is passed through.
    Unparseable,
}

/// Result of validating one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub profile: Profile,
    pub outcome: ValidationOutcome,
}

/// Validate raw model output against the five-field profile contract.
pub fn validate_profile(raw: &str) -> Validation {
    let Some(object) = extract_object(raw) else {
        return Validation {
            profile: Profile::Raw(raw.to_string()),
            outcome: ValidationOutcome::Unparseable,
        };
    };

    let mut profile = ValidatedProfile::default();
    let mut missing = Vec::new();
    let mut coerced = Vec::new();

    for field in ValidatedProfile::FIELDS {
        let (values, was_coerced) = match object.get(field) {
            None | Some(Value::Null) => {
                missing.push(field);
                continue;
            }
            Some(value) => coerce_list(value),
        };
        if was_coerced {
            coerced.push(field);
        }
        if let Some(slot) = profile.field_mut(field) {
            *slot = values;
        }
    }

    let outcome = if missing.is_empty() && coerced.is_empty() {
        ValidationOutcome::Intact
    } else {
        ValidationOutcome::Repaired { missing, coerced }
    };

    Validation {
        profile: Profile::Structured(profile),
        outcome,
    }
}

/// Find a JSON object in model output: the whole text, a fenced block, or the
/// outermost `{ ... }` span.
fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    let candidates = [
        Some(trimmed),
        strip_fence(trimmed),
        outer_braces(trimmed),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|text| match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

fn strip_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    // Skip the info string (`json`, `JSON`, ...) up to the first newline.
    let body = &rest[rest.find('\n')? + 1..];
    let end = body.rfind("```")?;
    Some(body[..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Read a field value as a list of strings. The flag is set when anything
/// had to change.
fn coerce_list(value: &Value) -> (Vec<String>, bool) {
    match value {
        Value::Array(items) => {
            let mut changed = false;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    Value::Number(n) => {
                        out.push(n.to_string());
                        changed = true;
                    }
                    Value::Bool(b) => {
                        out.push(b.to_string());
                        changed = true;
                    }
                    _ => changed = true,
                }
            }
            (out, changed)
        }
        Value::String(s) => (vec![s.clone()], true),
        _ => (Vec::new(), true),
    }
}

// ---------------------------------------------------------------------------
// Validator with side effects
// ---------------------------------------------------------------------------

/// Validates extraction output, audits it and persists structured profiles.
#[derive(Clone)]
pub struct SchemaValidator {
    writer: Option<ArtifactWriter>,
    audit: Arc<dyn AuditLog>,
}

impl SchemaValidator {
    pub fn new(writer: Option<ArtifactWriter>, audit: Arc<dyn AuditLog>) -> Self {
        Self { writer, audit }
    }

    /// Validate `raw` for publication `pub_id`.
    ///
    /// Structured results are written to disk straight away; a failed write
    /// is audited as a warning and does not affect the returned profile.
    pub fn validate(&self, raw: &str, pub_id: &str, stamp: &RunStamp) -> Validation {
        let validation = validate_profile(raw);

        let (outcome, missing, coerced) = match &validation.outcome {
            ValidationOutcome::Intact => ("intact", Vec::new(), Vec::new()),
            ValidationOutcome::Repaired { missing, coerced } => {
                ("repaired", missing.clone(), coerced.clone())
            }
            ValidationOutcome::Unparseable => ("unparseable", Vec::new(), Vec::new()),
        };
        debug!(pub_id, outcome, ?missing, ?coerced, "profile validated");

        self.audit.info(
            "profile_validated",
            &json!({
                "pub_id": pub_id,
                "outcome": outcome,
                "missing": missing,
                "coerced": coerced,
                "raw": raw,
                "validated": validation.profile,
            }),
        );

        if let (Some(writer), Profile::Structured(profile)) = (&self.writer, &validation.profile) {
            match writer.write_profile(profile, pub_id, stamp) {
                Ok(meta) => self.audit.info(
                    "profile_saved",
                    &json!({ "pub_id": pub_id, "path": meta.path, "sha256": meta.sha256 }),
                ),
                Err(e) => {
                    warn!(pub_id, error = %e, "could not persist validated profile");
                    self.audit.warn(
                        "profile_save_failed",
                        &json!({ "pub_id": pub_id, "error": e.to_string() }),
                    );
                }
            }
        }

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;

    fn structured(v: &Validation) -> &ValidatedProfile {
        v.profile.as_structured().expect("structured profile")
    }

    #[test]
    fn partial_record_gets_empty_fields() {
        let v = validate_profile(r#"{"tools": ["LangChain"]}"#);
        let p = structured(&v);
        assert_eq!(p.tools, vec!["LangChain"]);
        assert!(p.evaluation_methods.is_empty());
        assert!(p.datasets.is_empty());
        assert!(p.task_types.is_empty());
        assert!(p.results.is_empty());
        assert_eq!(
            v.outcome,
            ValidationOutcome::Repaired {
                missing: vec!["evaluation_methods", "datasets", "task_types", "results"],
                coerced: vec![],
            }
        );
    }

    #[test]
    fn well_formed_record_passes_through() {
        let input = ValidatedProfile {
            tools: vec!["HuggingFace".into(), "PyTorch".into()],
            evaluation_methods: vec!["BLEU".into()],
            datasets: vec!["SST-2".into()],
            task_types: vec!["classification".into()],
            results: vec!["92.1% accuracy".into()],
        };
        let text = serde_json::to_string(&input).unwrap();

        let v = validate_profile(&text);
        assert_eq!(v.outcome, ValidationOutcome::Intact);
        assert_eq!(structured(&v), &input);

        // Validating the validated output again changes nothing.
        let again = validate_profile(&serde_json::to_string(structured(&v)).unwrap());
        assert_eq!(again.profile, v.profile);
    }

    #[test]
    fn non_json_text_is_returned_unchanged() {
        for raw in [
            "The paper uses several tools.",
            "",
            "   ",
            "[\"tools\"]",
            "42",
            "{not json at all}",
            "\"just a string\"",
        ] {
            let v = validate_profile(raw);
            assert_eq!(v.profile, Profile::Raw(raw.to_string()), "input: {raw:?}");
            assert_eq!(v.outcome, ValidationOutcome::Unparseable);
        }
    }

    #[test]
    fn fenced_and_wrapped_json_is_found() {
        let fenced = "```json\n{\"datasets\": [\"SQuAD\"]}\n```";
        assert_eq!(structured(&validate_profile(fenced)).datasets, vec!["SQuAD"]);

        let chatty = "Here is the profile: {\"tools\": [\"spaCy\"]} Hope this helps!";
        assert_eq!(structured(&validate_profile(chatty)).tools, vec!["spaCy"]);
    }

    #[test]
    fn wrong_shapes_are_coerced() {
        let v = validate_profile(
            r#"{"tools": "LangChain", "datasets": [1, true, null, {"x": 1}, "GLUE"],
                "results": {"acc": 0.9}, "task_types": null, "extra": ["ignored"]}"#,
        );
        let p = structured(&v);
        assert_eq!(p.tools, vec!["LangChain"]);
        assert_eq!(p.datasets, vec!["1", "true", "GLUE"]);
        assert!(p.results.is_empty());
        assert!(p.task_types.is_empty());
        assert_eq!(
            v.outcome,
            ValidationOutcome::Repaired {
                missing: vec!["evaluation_methods", "task_types"],
                coerced: vec!["tools", "datasets", "results"],
            }
        );
    }

    #[test]
    fn structured_profile_is_persisted_and_audited() {
        let root = std::env::temp_dir().join(format!("pubcompare-validator-{}", uuid::Uuid::now_v7()));
        let writer = ArtifactWriter::new(&root);
        let audit = Arc::new(MemoryAuditLog::new());
        let validator = SchemaValidator::new(Some(writer.clone()), audit.clone());
        let stamp = RunStamp::now();

        let raw = r#"{"tools": ["BLEU scorer"]}"#;
        let v = validator.validate(raw, "pub1_paper", &stamp);
        assert!(v.profile.is_structured());

        let path = writer.profile_path("pub1_paper", &stamp);
        let saved: ValidatedProfile =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.tools, vec!["BLEU scorer"]);

        let records = audit.find("profile_validated");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].detail["raw"], raw);
        assert_eq!(records[0].detail["validated"]["tools"][0], "BLEU scorer");
        assert_eq!(audit.find("profile_saved").len(), 1);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn raw_profile_is_not_persisted() {
        let root = std::env::temp_dir().join(format!("pubcompare-validator-{}", uuid::Uuid::now_v7()));
        let audit = Arc::new(MemoryAuditLog::new());
        let validator = SchemaValidator::new(Some(ArtifactWriter::new(&root)), audit.clone());

        let v = validator.validate("no json here", "pub2_paper", &RunStamp::now());
        assert_eq!(v.profile, Profile::Raw("no json here".into()));
        assert!(!root.exists());
        assert_eq!(audit.find("profile_validated")[0].detail["outcome"], "unparseable");
    }

    #[test]
    fn save_failure_is_audited_not_raised() {
        let blocker = std::env::temp_dir().join(format!("pubcompare-blocker-{}", uuid::Uuid::now_v7()));
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let audit = Arc::new(MemoryAuditLog::new());
        let validator = SchemaValidator::new(Some(ArtifactWriter::new(&blocker)), audit.clone());
        let v = validator.validate(r#"{"tools": []}"#, "pub1_x", &RunStamp::now());

        assert!(v.profile.is_structured());
        assert_eq!(audit.find("profile_save_failed").len(), 1);

        let _ = std::fs::remove_file(&blocker);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_text_yields_a_profile(raw in any::<String>()) {
                let v = validate_profile(&raw);
                match v.outcome {
                    ValidationOutcome::Unparseable => prop_assert_eq!(v.profile, Profile::Raw(raw)),
                    _ => prop_assert!(v.profile.is_structured()),
                }
            }

            #[test]
            fn object_fields_survive_with_missing_ones_filled(
                fields in proptest::collection::vec(
                    proptest::option::of(proptest::collection::vec(".*", 0..4)),
                    5,
                ),
                prose in "[a-zA-Z .,]{0,40}",
            ) {
                let mut object = Map::new();
                let mut expected = ValidatedProfile::default();
                for (name, values) in ValidatedProfile::FIELDS.iter().zip(&fields) {
                    if let Some(values) = values {
                        object.insert((*name).to_string(), json!(values));
                        *expected.field_mut(name).unwrap() = values.clone();
                    }
                }
                let raw = format!("{prose}\n{}", Value::Object(object));

                let v = validate_profile(&raw);
                prop_assert_eq!(v.profile, Profile::Structured(expected));
                prop_assert_ne!(v.outcome, ValidationOutcome::Unparseable);
            }
        }
    }
}
