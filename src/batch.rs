// 📦 Batch Review - questionnaire documents in, decisions out
// Records are evaluated one at a time in input order. A bad record is
// reported and skipped; the rest of the batch still runs.

use crate::engine::DecisionEngine;
use crate::questionnaire::{Classification, Questionnaire};
use crate::registry::RegistryStore;
use crate::response_log::ResponseLog;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// INPUT
// ============================================================================

/// One record from the input document, decoded or not
#[derive(Debug)]
pub struct InputRecord {
    /// Questionnaire id if one could be read, else `#<position>`
    pub label: String,
    pub questionnaire: std::result::Result<Questionnaire, String>,
}

/// Input document format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => InputFormat::Csv,
            _ => InputFormat::Json,
        }
    }
}

/// Read every record of a questionnaire document.
///
/// Fails only if the document as a whole cannot be read; individual bad
/// records come back as `Err` entries.
pub fn load_records(path: &Path) -> Result<Vec<InputRecord>> {
    match InputFormat::detect(path) {
        InputFormat::Json => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read questionnaire file: {:?}", path))?;
            decode_json(&content).with_context(|| format!("Invalid JSON in {:?}", path))
        }
        InputFormat::Csv => {
            let reader = csv::Reader::from_path(path)
                .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
            decode_csv(reader)
        }
    }
}

/// A JSON array of questionnaire objects
pub fn decode_json(content: &str) -> Result<Vec<InputRecord>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(content).context("Expected a JSON array of questionnaires")?;

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let label = value
                .get("questionnaire_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", index + 1));
            let questionnaire = serde_json::from_value(value).map_err(|e| e.to_string());
            InputRecord {
                label,
                questionnaire,
            }
        })
        .collect())
}

/// CSV with a header row naming the questionnaire fields
pub fn decode_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<InputRecord>> {
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let id_column = headers.iter().position(|h| h.trim() == "questionnaire_id");

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let fallback = format!("#{}", index + 1);
        let record = match row {
            Ok(row) => {
                let label = id_column
                    .and_then(|i| row.get(i))
                    .filter(|id| !id.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or(fallback);
                let questionnaire = row
                    .deserialize::<Questionnaire>(Some(&headers))
                    .map_err(|e| e.to_string());
                InputRecord {
                    label,
                    questionnaire,
                }
            }
            Err(e) => InputRecord {
                label: fallback,
                questionnaire: Err(e.to_string()),
            },
        };
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub questionnaire_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub approved: usize,
    pub returned: usize,
    pub escalated: usize,
    pub errors: Vec<RecordError>,
}

impl BatchSummary {
    fn record_success(&mut self, classification: Classification) {
        self.succeeded += 1;
        match classification {
            Classification::Approve => self.approved += 1,
            Classification::Return => self.returned += 1,
            Classification::Escalate => self.escalated += 1,
        }
    }

    fn record_failure(&mut self, questionnaire_id: &str, message: String) {
        warn!(questionnaire_id, error = %message, "questionnaire skipped");
        self.failed += 1;
        self.errors.push(RecordError {
            questionnaire_id: questionnaire_id.to_string(),
            message,
        });
    }

    pub fn summary(&self) -> String {
        format!(
            "{} questionnaires: {} succeeded, {} failed | {} approved, {} returned, {} escalated",
            self.total,
            self.succeeded,
            self.failed,
            self.approved,
            self.returned,
            self.escalated
        )
    }
}

// ============================================================================
// BATCH REVIEW
// ============================================================================

pub struct BatchReviewer<'a> {
    engine: &'a DecisionEngine,
    store: &'a mut RegistryStore,
    log: &'a ResponseLog,
}

impl<'a> BatchReviewer<'a> {
    pub fn new(engine: &'a DecisionEngine, store: &'a mut RegistryStore, log: &'a ResponseLog) -> Self {
        BatchReviewer { engine, store, log }
    }

    /// Review every questionnaire in the document at `path`.
    pub fn review_file(&mut self, path: &Path) -> Result<BatchSummary> {
        let records = load_records(path)?;
        if records.is_empty() {
            info!(path = %path.display(), "no questionnaires in input");
        }
        self.review_records(records)
    }

    pub fn review_records(&mut self, records: Vec<InputRecord>) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            total: records.len(),
            ..BatchSummary::default()
        };

        for record in records {
            let questionnaire = match record.questionnaire {
                Ok(q) => q,
                Err(message) => {
                    summary.record_failure(&record.label, message);
                    continue;
                }
            };

            // Pick up registry changes made by the feedback loop mid-run
            self.store
                .refresh()
                .with_context(|| format!("Failed to refresh registry {:?}", self.store.path()))?;
            let screening = self.store.snapshot();

            let decision = match self.engine.evaluate(&questionnaire, &screening) {
                Ok(decision) => decision,
                Err(e) => {
                    summary.record_failure(&record.label, e.to_string());
                    continue;
                }
            };

            if let Err(e) = self.log.append(&decision) {
                summary.record_failure(&record.label, e.to_string());
                continue;
            }

            info!(
                questionnaire_id = %decision.questionnaire_id,
                decision = %decision.decision,
                reason = decision.escalation_reason.as_deref().unwrap_or(""),
                "questionnaire reviewed"
            );
            summary.record_success(decision.decision);
        }

        Ok(summary)
    }
}

// ============================================================================
// TESTS
// ============================================================================
