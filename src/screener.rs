// 🔎 Text Screener - narrative fields vs. the suspicious term registry
// Keywords are whole-word matches, patterns are unanchored regex searches.
//
// Precedence (first hit wins):
//   1. any registry keyword  -> "Ambiguous source of funds"
//   2. any registry pattern  -> "Ambiguous source of funds"
//   3. "does not meet"       -> "Investor is not accredited"

use crate::questionnaire::Questionnaire;
use crate::registry::{PatternEntry, Registry, RegistryError};
use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use std::fmt;

/// Phrase that marks a self-declared failure to meet accreditation criteria
pub const NOT_ACCREDITED_PHRASE: &str = "does not meet";

// ============================================================================
// ESCALATION REASONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscalationReason {
    AmbiguousSourceOfFunds,
    NotAccredited,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::AmbiguousSourceOfFunds => "Ambiguous source of funds",
            EscalationReason::NotAccredited => "Investor is not accredited",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What tripped the screener, for audit logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Keyword(String),
    Pattern(PatternEntry),
    Phrase(&'static str),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Keyword(term) => write!(f, "keyword '{}'", term),
            Trigger::Pattern(entry) if entry.description.is_empty() => {
                write!(f, "pattern /{}/", entry.pattern)
            }
            Trigger::Pattern(entry) => write!(f, "pattern /{}/ ({})", entry.pattern, entry.description),
            Trigger::Phrase(phrase) => write!(f, "phrase '{}'", phrase),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenMatch {
    pub reason: EscalationReason,
    pub trigger: Trigger,
}

// ============================================================================
// SCREENING SET (compiled registry snapshot)
// ============================================================================

/// Registry keywords and patterns compiled once into regex sets.
///
/// Built whenever the registry is loaded or changes; cheap to share behind an
/// `Arc` and reused for every questionnaire evaluated against that snapshot.
#[derive(Debug, Clone)]
pub struct ScreeningSet {
    keywords: Vec<String>,
    keyword_set: RegexSet,
    patterns: Vec<PatternEntry>,
    pattern_set: RegexSet,
}

impl ScreeningSet {
    /// Compile every keyword and pattern; the first pattern that does not
    /// compile is an error.
    pub fn compile(registry: &Registry) -> Result<Self, RegistryError> {
        let (set, rejected) = Self::compile_valid(registry)?;
        match rejected.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(set),
        }
    }

    /// Compile what compiles. Patterns that fail are left out of the set and
    /// returned alongside it, one `InvalidPattern` each.
    pub fn compile_valid(registry: &Registry) -> Result<(Self, Vec<RegistryError>), RegistryError> {
        let keywords: Vec<String> = registry.all_keywords().into_iter().collect();
        let keyword_exprs: Vec<String> = keywords
            .iter()
            .map(|term| format!(r"\b{}\b", regex::escape(term)))
            .collect();

        let keyword_set = RegexSetBuilder::new(&keyword_exprs)
            .case_insensitive(true)
            .build()
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: keyword_exprs.join(" | "),
                source,
            })?;

        // Compile each pattern alone first so an error names the culprit
        let mut patterns = Vec::with_capacity(registry.patterns.len());
        let mut rejected = Vec::new();
        for entry in &registry.patterns {
            match RegexBuilder::new(&entry.pattern).case_insensitive(true).build() {
                Ok(_) => patterns.push(entry.clone()),
                Err(source) => rejected.push(RegistryError::InvalidPattern {
                    pattern: entry.pattern.clone(),
                    source,
                }),
            }
        }

        let pattern_set = RegexSetBuilder::new(patterns.iter().map(|p| p.pattern.as_str()))
            .case_insensitive(true)
            .build()
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: patterns
                    .iter()
                    .map(|p| p.pattern.as_str())
                    .collect::<Vec<_>>()
                    .join(" | "),
                source,
            })?;

        let set = ScreeningSet {
            keywords,
            keyword_set,
            patterns,
            pattern_set,
        };
        Ok((set, rejected))
    }

    pub fn empty() -> Self {
        ScreeningSet {
            keywords: Vec::new(),
            keyword_set: RegexSet::empty(),
            patterns: Vec::new(),
            pattern_set: RegexSet::empty(),
        }
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Escalation reason for the questionnaire's narrative, if any
    pub fn screen(&self, questionnaire: &Questionnaire) -> Option<EscalationReason> {
        self.inspect(questionnaire).map(|m| m.reason)
    }

    /// Like `screen`, but also reports what matched
    pub fn inspect(&self, questionnaire: &Questionnaire) -> Option<ScreenMatch> {
        self.inspect_text(&questionnaire.scan_text())
    }

    pub fn inspect_text(&self, text: &str) -> Option<ScreenMatch> {
        let text = text.to_lowercase();

        if let Some(index) = self.keyword_set.matches(&text).iter().next() {
            return Some(ScreenMatch {
                reason: EscalationReason::AmbiguousSourceOfFunds,
                trigger: Trigger::Keyword(self.keywords[index].clone()),
            });
        }

        if let Some(index) = self.pattern_set.matches(&text).iter().next() {
            return Some(ScreenMatch {
                reason: EscalationReason::AmbiguousSourceOfFunds,
                trigger: Trigger::Pattern(self.patterns[index].clone()),
            });
        }

        if text.contains(NOT_ACCREDITED_PHRASE) {
            return Some(ScreenMatch {
                reason: EscalationReason::NotAccredited,
                trigger: Trigger::Phrase(NOT_ACCREDITED_PHRASE),
            });
        }

        None
    }
}

impl Default for ScreeningSet {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
