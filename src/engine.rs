// ⚖️ Decision Engine - Approve / Return / Escalate
// Field validation and text screening merged in a fixed precedence order.
//
//   Pending ──validator──▶ Validated ──screener──▶ Screened ──▶ Decided
//      │                       │
//      └── missing fields ─────┴── amount too low / not accredited ──▶ Decided
//
// Structural problems always win over suspicious wording: an incomplete
// questionnaire is returned, never escalated for its text.

use crate::config::ReviewPolicy;
use crate::questionnaire::{Decision, Questionnaire};
use crate::screener::{ScreenMatch, ScreeningSet};
use crate::validator::{self, amount_exceeds};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("questionnaire has a blank identifier")]
    BlankIdentifier,

    #[error("questionnaire {questionnaire_id}: investment amount {amount} is not a finite number")]
    NonFiniteAmount { questionnaire_id: String, amount: f64 },
}

// ============================================================================
// STATES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewState {
    Pending,
    Validated,
    Screened(Option<ScreenMatch>),
    Decided(Decision),
}

impl ReviewState {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewState::Pending => "Pending",
            ReviewState::Validated => "Validated",
            ReviewState::Screened(_) => "Screened",
            ReviewState::Decided(_) => "Decided",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Decided(_))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Rule-based reviewer. Holds only the policy; the registry snapshot is
/// passed per call so every decision names exactly what it was judged
/// against.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: ReviewPolicy,
}

impl DecisionEngine {
    pub fn new(policy: ReviewPolicy) -> Self {
        DecisionEngine { policy }
    }

    pub fn policy(&self) -> &ReviewPolicy {
        &self.policy
    }

    /// Decide one questionnaire against one registry snapshot.
    ///
    /// Deterministic: the same questionnaire, snapshot and policy always
    /// produce the same decision.
    pub fn evaluate(
        &self,
        questionnaire: &Questionnaire,
        screening: &ScreeningSet,
    ) -> Result<Decision, EngineError> {
        check_well_formed(questionnaire)?;

        let mut state = ReviewState::Pending;
        loop {
            state = self.step(state, questionnaire, screening);
            debug!(
                questionnaire_id = %questionnaire.questionnaire_id,
                state = state.name(),
                "review transition"
            );
            if let ReviewState::Decided(decision) = state {
                return Ok(decision);
            }
        }
    }

    /// Advance one transition.
    pub fn step(
        &self,
        state: ReviewState,
        q: &Questionnaire,
        screening: &ScreeningSet,
    ) -> ReviewState {
        let id = q.questionnaire_id.as_str();

        match state {
            ReviewState::Pending => {
                let missing = validator::validate(
                    q,
                    &self.policy.required_fields,
                    self.policy.min_investment_amount,
                );
                if missing.is_empty() {
                    ReviewState::Validated
                } else {
                    ReviewState::Decided(Decision::returned(id, missing))
                }
            }

            ReviewState::Validated => {
                if !amount_exceeds(q.investment_amount, self.policy.min_investment_amount) {
                    ReviewState::Decided(Decision::returned(id, Vec::new()))
                } else if !q.is_accredited_investor {
                    // Structural escalation, no textual reason attached
                    ReviewState::Decided(Decision::escalated(id, None))
                } else {
                    ReviewState::Screened(screening.inspect(q))
                }
            }

            ReviewState::Screened(Some(hit)) => {
                debug!(questionnaire_id = %id, trigger = %hit.trigger, "screening hit");
                ReviewState::Decided(Decision::escalated(id, Some(hit.reason.to_string())))
            }

            ReviewState::Screened(None) => ReviewState::Decided(Decision::approved(id)),

            decided @ ReviewState::Decided(_) => decided,
        }
    }
}

fn check_well_formed(q: &Questionnaire) -> Result<(), EngineError> {
    if q.questionnaire_id.trim().is_empty() {
        return Err(EngineError::BlankIdentifier);
    }
    if let Some(amount) = q.investment_amount {
        if !amount.is_finite() {
            return Err(EngineError::NonFiniteAmount {
                questionnaire_id: q.questionnaire_id.clone(),
                amount,
            });
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
