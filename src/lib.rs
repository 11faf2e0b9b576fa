// Subscription Review - Core Library
// Rule-based triage of investment subscription questionnaires

pub mod persist;
pub mod questionnaire;
pub mod config;
pub mod validator;
pub mod registry;
pub mod screener;
pub mod engine;
pub mod response_log;
pub mod feedback;
pub mod batch;

// Re-export commonly used types
pub use questionnaire::{Classification, Decision, Questionnaire};
pub use config::{ConfigError, ReviewConfig, ReviewPolicy};
pub use validator::{validate, FieldKind, RequiredField};
pub use registry::{
    KeywordCategory, PatternEntry, Registry, RegistryError, RegistryStore,
};
pub use screener::{EscalationReason, ScreenMatch, ScreeningSet, Trigger};
pub use engine::{DecisionEngine, EngineError, ReviewState};
pub use response_log::{Journal, JournalEntry, ResponseLog};
pub use feedback::{
    parse_feedback, Feedback, FeedbackError, FeedbackLog, FeedbackLoop, FeedbackRecord,
};
pub use batch::{BatchReviewer, BatchSummary, InputRecord, RecordError};
pub use persist::StoreError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
