// 🔁 Feedback Loop - reviewer corrections feed the term registry
// Runs independently of batch review; shares only the registry file.
//
// Every correction is journaled. Corrections that should have escalated
// teach the registry new terms taken from the reviewer's reasoning.

use crate::persist::StoreError;
use crate::questionnaire::{Classification, Questionnaire};
use crate::registry::{RegistryError, RegistryStore};
use crate::response_log::{Journal, JournalEntry};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Registry category that learned terms land in
pub const FEEDBACK_CATEGORY: &str = "feedback";

/// Shorter tokens are too generic to learn
const MIN_TERM_CHARS: usize = 4;

/// Words long enough to pass `MIN_TERM_CHARS` that show up in ordinary
/// narratives. Learning one would escalate almost every questionnaire.
const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "company", "could", "from",
    "fund", "funds", "have", "income", "into", "investment", "investor", "money", "only",
    "other", "over", "same", "should", "some", "source", "sources", "such", "than",
    "that", "their", "them", "there", "these", "they", "this", "those", "through",
    "very", "were", "what", "when", "where", "which", "while", "with", "would", "year",
    "years",
];

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// FEEDBACK
// ============================================================================

/// A reviewer's correction of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub questionnaire: Questionnaire,
    pub wrong_decision: Classification,
    pub reasoning: String,
    pub correct_decision: Classification,

    /// Day the correction was made (YYYY-MM-DD)
    #[serde(default = "today")]
    pub timestamp: String,
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

impl Feedback {
    pub fn new(
        questionnaire: Questionnaire,
        wrong_decision: Classification,
        correct_decision: Classification,
        reasoning: impl Into<String>,
    ) -> Self {
        Feedback {
            questionnaire,
            wrong_decision,
            reasoning: reasoning.into(),
            correct_decision,
            timestamp: today(),
        }
    }

    /// Should the registry learn from this correction?
    pub fn calls_for_escalation(&self) -> bool {
        self.correct_decision == Classification::Escalate
            && self.wrong_decision != Classification::Escalate
    }

    /// Candidate terms: lower-cased reasoning tokens of at least four
    /// characters, punctuation trimmed, that also appear as whole words in
    /// the questionnaire's narrative. Common words (`STOP_WORDS`) are never
    /// candidates. First occurrence order.
    pub fn candidate_terms(&self) -> Vec<String> {
        let narrative: BTreeSet<String> = words(&self.questionnaire.scan_text()).collect();
        let mut seen = BTreeSet::new();

        words(&self.reasoning.to_lowercase())
            .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .filter(|w| narrative.contains(w))
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    fn registry_description(&self) -> String {
        let head: String = self.reasoning.chars().take(50).collect();
        format!("Added from feedback: {}...", head)
    }
}

/// Decode a feedback document: one object, or an array of them.
/// The shape is chosen from the first non-blank character so a bad element
/// in an array reports its own error.
pub fn parse_feedback(content: &str) -> Result<Vec<Feedback>, serde_json::Error> {
    if content.trim_start().starts_with('[') {
        serde_json::from_str(content)
    } else {
        serde_json::from_str::<Feedback>(content).map(|feedback| vec![feedback])
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.questionnaire;
        writeln!(f, "Previous Decision: {}", self.wrong_decision)?;
        writeln!(f, "Correct Decision: {}", self.correct_decision)?;
        writeln!(f, "Reasoning: {}", self.reasoning)?;
        writeln!(f, "Questionnaire Details:")?;
        writeln!(f, "- Investor: {}", q.investor_name)?;
        writeln!(f, "- Accreditation: {}", q.accreditation_details)?;
        writeln!(f, "- Source of Funds: {}", q.source_of_funds_description)?;
        match q.investment_amount {
            Some(amount) => writeln!(f, "- Investment Amount: {:.2}", amount)?,
            None => writeln!(f, "- Investment Amount: not provided")?,
        }
        writeln!(f, "- Accredited: {}", q.is_accredited_investor)?;
        writeln!(f, "- Tax ID Provided: {}", q.tax_id_provided)?;
        write!(f, "- Signature Present: {}", q.signature_present)
    }
}

// ============================================================================
// FEEDBACK RECORD (journaled)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: String,

    #[serde(flatten)]
    pub feedback: Feedback,

    /// Terms this correction added to the registry
    #[serde(default)]
    pub learned_terms: Vec<String>,
}

impl JournalEntry for FeedbackRecord {
    fn key(&self) -> &str {
        &self.feedback.questionnaire.questionnaire_id
    }
}

pub type FeedbackLog = Journal<FeedbackRecord>;

// ============================================================================
// FEEDBACK LOOP
// ============================================================================

pub struct FeedbackLoop {
    log: FeedbackLog,
}

impl FeedbackLoop {
    pub fn new(log_path: impl AsRef<Path>) -> Self {
        FeedbackLoop {
            log: FeedbackLog::new(log_path),
        }
    }

    pub fn log(&self) -> &FeedbackLog {
        &self.log
    }

    /// Apply one correction to the registry and journal it.
    ///
    /// Learned terms are written in a single registry update, so a failed
    /// update leaves neither the registry nor the log changed.
    pub fn submit(
        &self,
        store: &mut RegistryStore,
        feedback: Feedback,
    ) -> Result<FeedbackRecord, FeedbackError> {
        let learned_terms = if feedback.calls_for_escalation() {
            let description = feedback.registry_description();
            store.add_keywords(
                FEEDBACK_CATEGORY,
                &feedback.candidate_terms(),
                Some(description.as_str()),
            )?
        } else {
            Vec::new()
        };

        let record = FeedbackRecord {
            feedback_id: uuid::Uuid::new_v4().to_string(),
            feedback,
            learned_terms,
        };
        self.log.append(&record)?;

        info!(
            feedback_id = %record.feedback_id,
            questionnaire_id = %record.feedback.questionnaire.questionnaire_id,
            wrong = %record.feedback.wrong_decision,
            correct = %record.feedback.correct_decision,
            learned = record.learned_terms.len(),
            "feedback recorded"
        );

        Ok(record)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::tests::clean_questionnaire;
    use tempfile::tempdir;

    fn missed_escalation() -> Feedback {
        let mut q = clean_questionnaire("Q-77");
        q.source_of_funds_description = "Winnings from overseas casino, remainder via nominee".to_string();
        Feedback::new(
            q,
            Classification::Approve,
            Classification::Escalate,
            "Casino winnings routed through a nominee are a red flag.",
        )
    }

    #[test]
    fn test_candidate_terms_come_from_reasoning_and_narrative() {
        let feedback = missed_escalation();
        assert_eq!(feedback.candidate_terms(), vec!["casino", "winnings", "nominee"]);
    }

    #[test]
    fn test_missed_escalation_teaches_registry() {
        let dir = tempdir().unwrap();
        let mut store = RegistryStore::load(dir.path().join("kw.json")).unwrap();
        let feedback_loop = FeedbackLoop::new(dir.path().join("feedback.json"));

        let record = feedback_loop.submit(&mut store, missed_escalation()).unwrap();

        assert_eq!(record.learned_terms, vec!["casino", "winnings", "nominee"]);
        let category = &store.registry().keywords[FEEDBACK_CATEGORY];
        assert!(category.description.starts_with("Added from feedback: Casino winnings"));
        assert!(category.description.ends_with("..."));

        // Screening now catches the same narrative
        let hit = store.snapshot().inspect(&record.feedback.questionnaire);
        assert!(hit.is_some());
    }

    #[test]
    fn test_known_terms_are_not_relearned() {
        let dir = tempdir().unwrap();
        let mut store = RegistryStore::load(dir.path().join("kw.json")).unwrap();
        store.add_keyword(FEEDBACK_CATEGORY, "casino", None).unwrap();
        let feedback_loop = FeedbackLoop::new(dir.path().join("feedback.json"));

        let record = feedback_loop.submit(&mut store, missed_escalation()).unwrap();

        assert_eq!(record.learned_terms, vec!["winnings", "nominee"]);
    }

    #[test]
    fn test_common_words_are_never_learned() {
        let mut q = clean_questionnaire("Q-8");
        q.source_of_funds_description = "Funds from a company with offshore accounts".to_string();
        let feedback = Feedback::new(
            q,
            Classification::Approve,
            Classification::Escalate,
            "Funds from a company with offshore accounts need checking",
        );

        assert_eq!(feedback.candidate_terms(), vec!["offshore", "accounts"]);
    }

    #[test]
    fn test_failed_registry_write_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let registry_path = dir.path().join("kw.json");
        let mut store = RegistryStore::load(&registry_path).unwrap();
        let feedback_loop = FeedbackLoop::new(dir.path().join("feedback.json"));

        // A directory where the temp sibling goes makes the registry write fail
        let blocker = dir.path().join("kw.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let err = feedback_loop.submit(&mut store, missed_escalation()).unwrap_err();
        assert!(matches!(err, FeedbackError::Registry(_)));
        assert!(RegistryStore::load(&registry_path).unwrap().all_keywords().is_empty());
        assert!(feedback_loop.log().is_empty().unwrap());

        std::fs::remove_dir(&blocker).unwrap();
        let record = feedback_loop.submit(&mut store, missed_escalation()).unwrap();
        assert_eq!(record.learned_terms, vec!["casino", "winnings", "nominee"]);
        assert_eq!(feedback_loop.log().len().unwrap(), 1);
    }

    #[test]
    fn test_other_corrections_only_journal() {
        let dir = tempdir().unwrap();
        let mut store = RegistryStore::load(dir.path().join("kw.json")).unwrap();
        let feedback_loop = FeedbackLoop::new(dir.path().join("feedback.json"));

        let feedback = Feedback::new(
            clean_questionnaire("Q-5"),
            Classification::Escalate,
            Classification::Approve,
            "Offshore wording was about a holiday home, not funds",
        );
        let record = feedback_loop.submit(&mut store, feedback).unwrap();

        assert!(record.learned_terms.is_empty());
        assert!(store.all_keywords().is_empty());
        assert_eq!(feedback_loop.log().find("Q-5").unwrap().len(), 1);
    }

    #[test]
    fn test_feedback_decodes_with_default_timestamp() {
        let q = serde_json::to_value(clean_questionnaire("Q-1")).unwrap();
        let json = serde_json::json!({
            "questionnaire": q,
            "wrong_decision": "Approve",
            "reasoning": "Source is vague",
            "correct_decision": "Escalate"
        });

        let feedback: Feedback = serde_json::from_value(json).unwrap();

        assert_eq!(feedback.timestamp.len(), 10);
        assert!(feedback.calls_for_escalation());
    }

    #[test]
    fn test_parse_feedback_object_or_array() {
        let q = serde_json::to_value(clean_questionnaire("Q-2")).unwrap();
        let item = serde_json::json!({
            "questionnaire": q,
            "wrong_decision": "Approve",
            "reasoning": "Vague",
            "correct_decision": "Escalate"
        });

        assert_eq!(parse_feedback(&item.to_string()).unwrap().len(), 1);
        let array = serde_json::json!([item.clone(), item]).to_string();
        assert_eq!(parse_feedback(&format!("\n  {}", array)).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_feedback_reports_bad_array_element() {
        let q = serde_json::to_value(clean_questionnaire("Q-3")).unwrap();
        let array = serde_json::json!([
            { "questionnaire": q, "wrong_decision": "Approve", "reasoning": "x", "correct_decision": "Escalate" },
            { "questionnaire": q, "wrong_decision": "Maybe", "reasoning": "x", "correct_decision": "Escalate" }
        ]);

        let err = parse_feedback(&array.to_string()).unwrap_err().to_string();
        assert!(err.contains("Maybe"), "{}", err);
        assert!(!err.contains("expected struct Feedback"), "{}", err);
    }

    #[test]
    fn test_display_renders_summary() {
        let text = missed_escalation().to_string();
        assert!(text.starts_with("Previous Decision: Approve\nCorrect Decision: Escalate"));
        assert!(text.contains("- Investment Amount: 250000.00"));
    }
}
