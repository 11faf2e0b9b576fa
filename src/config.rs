// ⚙️ Review Configuration - explicit values, no process-wide globals
// Loaded from a JSON file (every key optional) and turned into a
// validated `ReviewPolicy` before any questionnaire is evaluated.

use crate::validator::RequiredField;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown required field: {0}")]
    UnknownField(String),

    #[error("required field listed twice: {0}")]
    DuplicateField(String),

    #[error("minimum investment amount must be a finite number, got {0}")]
    InvalidMinimum(f64),
}

// ============================================================================
// REVIEW CONFIG (file-level)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Suspicious keyword/pattern registry
    pub registry_path: PathBuf,

    /// Decision log
    pub response_path: PathBuf,

    /// Feedback log
    pub feedback_path: PathBuf,

    /// Amounts must be strictly greater than this
    pub min_investment_amount: f64,

    /// Field names checked by the validator, in report order
    pub required_fields: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        ReviewConfig {
            registry_path: PathBuf::from("data/suspicious_keywords.json"),
            response_path: PathBuf::from("data/response.json"),
            feedback_path: PathBuf::from("data/feedback.json"),
            min_investment_amount: 0.0,
            required_fields: vec![
                "investor_name".to_string(),
                "investor_address".to_string(),
                "investment_amount".to_string(),
                "is_accredited_investor".to_string(),
                "signature_present".to_string(),
                "tax_id_provided".to_string(),
            ],
        }
    }
}

impl ReviewConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the decision-relevant settings
    pub fn policy(&self) -> Result<ReviewPolicy, ConfigError> {
        if !self.min_investment_amount.is_finite() {
            return Err(ConfigError::InvalidMinimum(self.min_investment_amount));
        }

        let mut seen = HashSet::new();
        let mut required_fields = Vec::with_capacity(self.required_fields.len());
        for name in &self.required_fields {
            let field: RequiredField = name
                .parse()
                .map_err(|_| ConfigError::UnknownField(name.clone()))?;
            if !seen.insert(field) {
                return Err(ConfigError::DuplicateField(name.clone()));
            }
            required_fields.push(field);
        }

        Ok(ReviewPolicy {
            required_fields,
            min_investment_amount: self.min_investment_amount,
        })
    }
}

// ============================================================================
// REVIEW POLICY (engine-level)
// ============================================================================

/// The thresholds a decision depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPolicy {
    pub required_fields: Vec<RequiredField>,
    pub min_investment_amount: f64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        ReviewPolicy {
            required_fields: vec![
                RequiredField::InvestorName,
                RequiredField::InvestorAddress,
                RequiredField::InvestmentAmount,
                RequiredField::IsAccreditedInvestor,
                RequiredField::SignaturePresent,
                RequiredField::TaxIdProvided,
            ],
            min_investment_amount: 0.0,
        }
    }
}
