// 🗂️ Suspicious Term Registry - keywords by category + regex patterns
// Persisted as one JSON document; every mutation is written through.
//
// Storage format:
// {
//   "keywords": { "<category>": { "risk_category", "description", "examples": [..] } },
//   "patterns": [ { "pattern", "description" } ]
// }

use crate::persist::{self, StoreError};
use crate::screener::ScreeningSet;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Risk level given to categories created on the fly
pub const DEFAULT_RISK_CATEGORY: &str = "medium_risk";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("keyword term must not be blank")]
    BlankTerm,

    #[error("pattern must not be blank")]
    BlankPattern,
}

impl RegistryError {
    /// Another writer changed the registry file while we were mutating it
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistryError::Store(StoreError::Conflict { .. }))
    }
}

// ============================================================================
// ENTRIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCategory {
    /// Risk level, e.g. "high_risk", "medium_risk"
    #[serde(alias = "category")]
    pub risk_category: String,

    #[serde(default)]
    pub description: String,

    /// Terms matched as whole words, no duplicates
    #[serde(default)]
    pub examples: Vec<String>,
}

impl KeywordCategory {
    pub fn new(risk_category: impl Into<String>, description: impl Into<String>) -> Self {
        KeywordCategory {
            risk_category: risk_category.into(),
            description: description.into(),
            examples: Vec::new(),
        }
    }

    /// Builder: add example term
    pub fn with_example(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        if !self.examples.contains(&term) {
            self.examples.push(term);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,

    #[serde(default)]
    pub description: String,
}

// ============================================================================
// REGISTRY (in-memory value)
// ============================================================================

/// Keywords and patterns at one point in time.
///
/// Categories are kept in name order so iteration and serialization are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub keywords: BTreeMap<String, KeywordCategory>,

    #[serde(default)]
    pub patterns: Vec<PatternEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every keyword across every category
    pub fn all_keywords(&self) -> BTreeSet<String> {
        self.keywords
            .values()
            .flat_map(|category| category.examples.iter().cloned())
            .collect()
    }

    /// Every pattern's expression text, in insertion order
    pub fn all_patterns(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.pattern.clone()).collect()
    }

    pub fn contains_keyword(&self, category: &str, term: &str) -> bool {
        self.keywords
            .get(category)
            .is_some_and(|c| c.examples.iter().any(|t| t == term))
    }

    pub fn contains_pattern(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p.pattern == pattern)
    }

    /// Returns true if the registry changed
    pub fn insert_keyword(&mut self, category: &str, term: &str, description: Option<&str>) -> bool {
        let entry = self.keywords.entry(category.to_string()).or_insert_with(|| {
            KeywordCategory::new(
                DEFAULT_RISK_CATEGORY,
                description
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Keywords related to {}", category)),
            )
        });

        if entry.examples.iter().any(|t| t == term) {
            return false;
        }
        entry.examples.push(term.to_string());
        true
    }

    /// Removes `term` from `category`; the category itself is kept even when
    /// it becomes empty.
    pub fn remove_keyword(&mut self, category: &str, term: &str) -> bool {
        match self.keywords.get_mut(category) {
            Some(entry) => {
                let before = entry.examples.len();
                entry.examples.retain(|t| t != term);
                entry.examples.len() != before
            }
            None => false,
        }
    }

    pub fn insert_pattern(&mut self, pattern: &str, description: &str) -> bool {
        if self.contains_pattern(pattern) {
            return false;
        }
        self.patterns.push(PatternEntry {
            pattern: pattern.to_string(),
            description: description.to_string(),
        });
        true
    }

    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let before = self.patterns.len();
        self.patterns.retain(|p| p.pattern != pattern);
        self.patterns.len() != before
    }

    /// Drop duplicate terms within a category and duplicate patterns,
    /// keeping first occurrences. Returns true if anything was dropped.
    pub fn dedupe(&mut self) -> bool {
        let mut changed = false;

        for entry in self.keywords.values_mut() {
            let mut seen = BTreeSet::new();
            let before = entry.examples.len();
            entry.examples.retain(|t| seen.insert(t.clone()));
            changed |= entry.examples.len() != before;
        }

        let mut seen = BTreeSet::new();
        let before = self.patterns.len();
        self.patterns.retain(|p| seen.insert(p.pattern.clone()));
        changed |= self.patterns.len() != before;

        changed
    }
}

// ============================================================================
// REGISTRY STORE (persisted)
// ============================================================================

/// The registry file plus the compiled matchers for its current content.
///
/// Mutations are load-modify-save critical sections under the file's lock:
/// the store re-reads the file, applies the change to what is on disk, and
/// writes it back only if nobody else rewrote it in between.
pub struct RegistryStore {
    path: PathBuf,
    registry: Registry,
    fingerprint: String,
    screening: Arc<ScreeningSet>,
}

impl RegistryStore {
    /// Load the registry at `path`.
    ///
    /// A missing or unreadable document is replaced by an empty registry,
    /// which is written back immediately. Patterns that do not compile are
    /// kept in the document but left out of the snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let (registry, fingerprint) = persist::with_file_lock(&path, || read_locked(&path))?;
        let screening = Arc::new(compile_snapshot(&path, &registry)?);

        debug!(
            path = %path.display(),
            keywords = screening.keyword_count(),
            patterns = screening.pattern_count(),
            "registry loaded"
        );

        Ok(RegistryStore {
            path,
            registry,
            fingerprint,
            screening,
        })
    }

    /// Rewrite the file from the in-memory registry.
    pub fn save(&mut self) -> Result<(), RegistryError> {
        let data = persist::encode_pretty(&self.path, &self.registry)?;
        let fingerprint = persist::with_file_lock(&self.path, || {
            persist::write_if_unchanged(&self.path, Some(self.fingerprint.as_str()), &data)
        })?;
        self.fingerprint = fingerprint;
        Ok(())
    }

    /// Reload if the file changed on disk since we last saw it.
    /// Returns true when a new snapshot was compiled.
    pub fn refresh(&mut self) -> Result<bool, RegistryError> {
        let on_disk = persist::read_bytes(&self.path)?.map(|b| persist::fingerprint(&b));
        if on_disk.as_deref() == Some(self.fingerprint.as_str()) {
            return Ok(false);
        }

        let (registry, fingerprint) =
            persist::with_file_lock(&self.path, || read_locked(&self.path))?;
        self.screening = Arc::new(compile_snapshot(&self.path, &registry)?);
        self.registry = registry;
        self.fingerprint = fingerprint;

        info!(path = %self.path.display(), "registry changed on disk, snapshot recompiled");
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compiled matchers for the current registry content
    pub fn snapshot(&self) -> Arc<ScreeningSet> {
        Arc::clone(&self.screening)
    }

    pub fn all_keywords(&self) -> BTreeSet<String> {
        self.registry.all_keywords()
    }

    pub fn all_patterns(&self) -> Vec<String> {
        self.registry.all_patterns()
    }

    /// Add `term` to `category`, creating the category if needed.
    /// Adding a term that is already there is a no-op and does not rewrite
    /// the file. Returns true if the registry changed.
    pub fn add_keyword(
        &mut self,
        category: &str,
        term: &str,
        description: Option<&str>,
    ) -> Result<bool, RegistryError> {
        if term.trim().is_empty() {
            return Err(RegistryError::BlankTerm);
        }

        let changed = self.mutate(|registry| registry.insert_keyword(category, term, description))?;
        if changed {
            info!(category, term, "keyword added");
        }
        Ok(changed)
    }

    /// Add several terms to `category` in one write. Either every new term
    /// lands on disk or none does. Returns the terms that were not already
    /// present, in the order given.
    pub fn add_keywords(
        &mut self,
        category: &str,
        terms: &[String],
        description: Option<&str>,
    ) -> Result<Vec<String>, RegistryError> {
        if terms.iter().any(|term| term.trim().is_empty()) {
            return Err(RegistryError::BlankTerm);
        }

        let mut added = Vec::new();
        self.mutate(|registry| {
            for term in terms {
                if registry.insert_keyword(category, term, description) {
                    added.push(term.clone());
                }
            }
            !added.is_empty()
        })?;

        if !added.is_empty() {
            info!(category, terms = ?added, "keywords added");
        }
        Ok(added)
    }

    pub fn remove_keyword(&mut self, category: &str, term: &str) -> Result<bool, RegistryError> {
        let changed = self.mutate(|registry| registry.remove_keyword(category, term))?;
        if changed {
            info!(category, term, "keyword removed");
        }
        Ok(changed)
    }

    /// Add a regex pattern. The expression must compile.
    pub fn add_pattern(&mut self, pattern: &str, description: &str) -> Result<bool, RegistryError> {
        if pattern.trim().is_empty() {
            return Err(RegistryError::BlankPattern);
        }
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        let changed = self.mutate(|registry| registry.insert_pattern(pattern, description))?;
        if changed {
            info!(pattern, description, "pattern added");
        }
        Ok(changed)
    }

    pub fn remove_pattern(&mut self, pattern: &str) -> Result<bool, RegistryError> {
        let changed = self.mutate(|registry| registry.remove_pattern(pattern))?;
        if changed {
            info!(pattern, "pattern removed");
        }
        Ok(changed)
    }

    /// Apply `op` to the on-disk registry under the file lock and persist
    /// the result if it changed.
    fn mutate(&mut self, op: impl FnOnce(&mut Registry) -> bool) -> Result<bool, RegistryError> {
        let path = self.path.clone();

        let outcome = persist::with_file_lock(&path, || -> Result<_, RegistryError> {
            let (mut registry, mut fingerprint) = read_locked(&path)?;
            let changed = op(&mut registry);

            let screening = compile_snapshot(&path, &registry)?;
            if changed {
                let data = persist::encode_pretty(&path, &registry)?;
                fingerprint = persist::write_if_unchanged(&path, Some(fingerprint.as_str()), &data)?;
            }
            Ok((registry, fingerprint, screening, changed))
        });

        let (registry, fingerprint, screening, changed) = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_conflict() {
                    warn!(path = %path.display(), "registry mutation rejected: concurrent writer");
                }
                return Err(err);
            }
        };

        self.registry = registry;
        self.fingerprint = fingerprint;
        self.screening = Arc::new(screening);
        Ok(changed)
    }
}

/// Compile the screening snapshot, leaving out patterns that do not compile.
/// They stay in the document so `remove_pattern` can still drop them.
fn compile_snapshot(path: &Path, registry: &Registry) -> Result<ScreeningSet, RegistryError> {
    let (screening, rejected) = ScreeningSet::compile_valid(registry)?;
    for err in &rejected {
        warn!(path = %path.display(), error = %err, "skipping registry pattern that does not compile");
    }
    Ok(screening)
}

/// Read the registry document, replacing a missing or corrupt file (and
/// any duplicate entries) with a well-formed one on disk.
/// Caller must hold the file lock.
fn read_locked(path: &Path) -> Result<(Registry, String), RegistryError> {
    let bytes = persist::read_bytes(path)?;
    let current = bytes.as_deref().map(persist::fingerprint);

    let (mut registry, mut needs_write) = match &bytes {
        None => {
            info!(path = %path.display(), "registry not found, initializing empty registry");
            (Registry::default(), true)
        }
        Some(bytes) => match serde_json::from_slice::<Registry>(bytes) {
            Ok(registry) => (registry, false),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "registry is corrupt, resetting to empty");
                (Registry::default(), true)
            }
        },
    };

    if registry.dedupe() {
        warn!(path = %path.display(), "registry contained duplicate entries, dropped them");
        needs_write = true;
    }

    match (needs_write, current) {
        (false, Some(fingerprint)) => Ok((registry, fingerprint)),
        (_, current) => {
            let data = persist::encode_pretty(path, &registry)?;
            let fingerprint = persist::write_if_unchanged(path, current.as_deref(), &data)?;
            Ok((registry, fingerprint))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
