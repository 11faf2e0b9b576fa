// 📋 Questionnaire & Decision - the records flowing through the engine
// A questionnaire comes in already parsed; a decision goes out to the log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// QUESTIONNAIRE
// ============================================================================

/// An investor's subscription disclosures.
///
/// Immutable once handed to the engine. Optional fields may be omitted from
/// the input document entirely; everything else must be present or the record
/// is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub questionnaire_id: String,

    pub investor_name: String,

    #[serde(default)]
    pub investor_address: Option<String>,

    #[serde(default)]
    pub investment_amount: Option<f64>,

    pub is_accredited_investor: bool,

    /// Free text describing how the investor qualifies
    pub accreditation_details: String,

    /// Free text describing where the money comes from
    pub source_of_funds_description: String,

    pub tax_id_provided: bool,

    pub signature_present: bool,

    pub submission_date: String,

    #[serde(default)]
    pub investor_type: Option<String>,
}

impl Questionnaire {
    /// The narrative text screened for suspicious terms, case-folded.
    pub fn scan_text(&self) -> String {
        format!(
            "{} {}",
            self.accreditation_details, self.source_of_funds_description
        )
        .to_lowercase()
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Approve,
    Return,
    Escalate,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Approve => "Approve",
            Classification::Return => "Return",
            Classification::Escalate => "Escalate",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Classification::Approve),
            "return" | "returned" => Ok(Classification::Return),
            "escalate" | "escalated" => Ok(Classification::Escalate),
            other => Err(format!("unknown classification: {}", other)),
        }
    }
}

// ============================================================================
// DECISION
// ============================================================================

/// Outcome of reviewing one questionnaire.
///
/// `missing_fields` is `None` rather than an empty list, and
/// `escalation_reason` is only ever set on an `Escalate` decision. Both keys
/// are always written (as `null` when absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub questionnaire_id: String,
    pub decision: Classification,
    pub missing_fields: Option<Vec<String>>,
    pub escalation_reason: Option<String>,
}

impl Decision {
    pub fn approved(questionnaire_id: &str) -> Self {
        Decision {
            questionnaire_id: questionnaire_id.to_string(),
            decision: Classification::Approve,
            missing_fields: None,
            escalation_reason: None,
        }
    }

    pub fn returned(questionnaire_id: &str, missing_fields: Vec<String>) -> Self {
        Decision {
            questionnaire_id: questionnaire_id.to_string(),
            decision: Classification::Return,
            missing_fields: if missing_fields.is_empty() {
                None
            } else {
                Some(missing_fields)
            },
            escalation_reason: None,
        }
    }

    pub fn escalated(questionnaire_id: &str, reason: Option<String>) -> Self {
        Decision {
            questionnaire_id: questionnaire_id.to_string(),
            decision: Classification::Escalate,
            missing_fields: None,
            escalation_reason: reason,
        }
    }

    pub fn summary(&self) -> String {
        let mut line = format!("{}: {}", self.questionnaire_id, self.decision);
        if let Some(missing) = &self.missing_fields {
            line.push_str(&format!(" (missing: {})", missing.join(", ")));
        }
        if let Some(reason) = &self.escalation_reason {
            line.push_str(&format!(" ({})", reason));
        }
        line
    }
}

// ============================================================================
// TESTS
// ============================================================================
