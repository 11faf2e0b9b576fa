// ✅ Field Validator - structural completeness checks
// Reports which required fields are missing or invalid, in configured order.

use crate::questionnaire::Questionnaire;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// REQUIRED FIELDS
// ============================================================================

/// A questionnaire field that configuration can mark as required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    InvestorName,
    InvestorAddress,
    InvestmentAmount,
    IsAccreditedInvestor,
    AccreditationDetails,
    SourceOfFundsDescription,
    TaxIdProvided,
    SignaturePresent,
    SubmissionDate,
    InvestorType,
}

/// How a field is judged present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Boolean that must be true (signature, tax id)
    AffirmedFlag,
    /// Boolean that is always present; its value is judged elsewhere
    Flag,
    /// Text that must not be absent or blank
    Text,
    /// Amount that must exceed the configured minimum
    Amount,
}

impl RequiredField {
    pub const ALL: [RequiredField; 10] = [
        RequiredField::InvestorName,
        RequiredField::InvestorAddress,
        RequiredField::InvestmentAmount,
        RequiredField::IsAccreditedInvestor,
        RequiredField::AccreditationDetails,
        RequiredField::SourceOfFundsDescription,
        RequiredField::TaxIdProvided,
        RequiredField::SignaturePresent,
        RequiredField::SubmissionDate,
        RequiredField::InvestorType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredField::InvestorName => "investor_name",
            RequiredField::InvestorAddress => "investor_address",
            RequiredField::InvestmentAmount => "investment_amount",
            RequiredField::IsAccreditedInvestor => "is_accredited_investor",
            RequiredField::AccreditationDetails => "accreditation_details",
            RequiredField::SourceOfFundsDescription => "source_of_funds_description",
            RequiredField::TaxIdProvided => "tax_id_provided",
            RequiredField::SignaturePresent => "signature_present",
            RequiredField::SubmissionDate => "submission_date",
            RequiredField::InvestorType => "investor_type",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            RequiredField::TaxIdProvided | RequiredField::SignaturePresent => {
                FieldKind::AffirmedFlag
            }
            RequiredField::IsAccreditedInvestor => FieldKind::Flag,
            RequiredField::InvestmentAmount => FieldKind::Amount,
            _ => FieldKind::Text,
        }
    }

    fn text<'q>(&self, q: &'q Questionnaire) -> Option<&'q str> {
        match self {
            RequiredField::InvestorName => Some(&q.investor_name),
            RequiredField::InvestorAddress => q.investor_address.as_deref(),
            RequiredField::AccreditationDetails => Some(&q.accreditation_details),
            RequiredField::SourceOfFundsDescription => Some(&q.source_of_funds_description),
            RequiredField::SubmissionDate => Some(&q.submission_date),
            RequiredField::InvestorType => q.investor_type.as_deref(),
            _ => None,
        }
    }

    fn flag(&self, q: &Questionnaire) -> bool {
        match self {
            RequiredField::TaxIdProvided => q.tax_id_provided,
            RequiredField::SignaturePresent => q.signature_present,
            RequiredField::IsAccreditedInvestor => q.is_accredited_investor,
            _ => false,
        }
    }

    /// Is this field deficient on `q`?
    pub fn is_missing(&self, q: &Questionnaire, min_investment_amount: f64) -> bool {
        match self.kind() {
            FieldKind::AffirmedFlag => !self.flag(q),
            FieldKind::Flag => false,
            FieldKind::Text => self.text(q).map_or(true, |s| s.trim().is_empty()),
            FieldKind::Amount => !amount_exceeds(q.investment_amount, min_investment_amount),
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequiredField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequiredField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| format!("unknown questionnaire field: {}", s))
    }
}

/// Amount present and strictly greater than the minimum
pub fn amount_exceeds(amount: Option<f64>, min_investment_amount: f64) -> bool {
    matches!(amount, Some(a) if a > min_investment_amount)
}

// ============================================================================
// VALIDATE
// ============================================================================

/// Names of the required fields that are missing or invalid, in the order
/// they were configured.
pub fn validate(
    questionnaire: &Questionnaire,
    required_fields: &[RequiredField],
    min_investment_amount: f64,
) -> Vec<String> {
    required_fields
        .iter()
        .filter(|field| field.is_missing(questionnaire, min_investment_amount))
        .map(|field| field.as_str().to_string())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::tests::clean_questionnaire;

    fn default_fields() -> Vec<RequiredField> {
        vec![
            RequiredField::InvestorName,
            RequiredField::InvestorAddress,
            RequiredField::InvestmentAmount,
            RequiredField::IsAccreditedInvestor,
            RequiredField::SignaturePresent,
            RequiredField::TaxIdProvided,
        ]
    }

    #[test]
    fn test_clean_questionnaire_has_no_missing_fields() {
        let q = clean_questionnaire("Q-1");
        assert!(validate(&q, &default_fields(), 0.0).is_empty());
    }

    #[test]
    fn test_missing_fields_follow_configured_order() {
        let mut q = clean_questionnaire("Q-2");
        q.tax_id_provided = false;
        q.investor_address = Some("   ".to_string());
        q.signature_present = false;

        let missing = validate(&q, &default_fields(), 0.0);

        assert_eq!(
            missing,
            vec!["investor_address", "signature_present", "tax_id_provided"]
        );
    }

    #[test]
    fn test_amount_not_above_minimum_is_reported() {
        let mut q = clean_questionnaire("Q-3");

        q.investment_amount = None;
        assert_eq!(validate(&q, &default_fields(), 0.0), vec!["investment_amount"]);

        q.investment_amount = Some(0.0);
        assert_eq!(validate(&q, &default_fields(), 0.0), vec!["investment_amount"]);

        q.investment_amount = Some(50_000.0);
        assert_eq!(
            validate(&q, &default_fields(), 50_000.0),
            vec!["investment_amount"]
        );

        q.investment_amount = Some(50_000.01);
        assert!(validate(&q, &default_fields(), 50_000.0).is_empty());
    }

    #[test]
    fn test_accreditation_flag_is_never_missing() {
        let mut q = clean_questionnaire("Q-4");
        q.is_accredited_investor = false;
        assert!(validate(&q, &[RequiredField::IsAccreditedInvestor], 0.0).is_empty());
    }

    #[test]
    fn test_unconfigured_fields_are_ignored() {
        let mut q = clean_questionnaire("Q-5");
        q.investor_type = None;
        q.submission_date = String::new();

        assert!(validate(&q, &default_fields(), 0.0).is_empty());
        assert_eq!(
            validate(&q, &[RequiredField::SubmissionDate, RequiredField::InvestorType], 0.0),
            vec!["submission_date", "investor_type"]
        );
    }

    #[test]
    fn test_required_field_from_str() {
        assert_eq!(
            "signature_present".parse::<RequiredField>().unwrap(),
            RequiredField::SignaturePresent
        );
        assert!("signature".parse::<RequiredField>().is_err());

        for field in RequiredField::ALL {
            assert_eq!(field.as_str().parse::<RequiredField>().unwrap(), field);
        }
    }
}
