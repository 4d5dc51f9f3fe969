//! Common Types and Constants
//!
//! Shared contracts and data structures used across all scheduler modules.

use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==================== Constants ====================

/// Floor applied to selection weights before sampling
pub const MIN_WEIGHT: f64 = 1e-6;

/// Default EMA decay factor
pub const DEFAULT_DECAY: f64 = 0.5;

/// Hard floor on the number of active cohorts.
///
/// No activation policy may shrink the active set below this, no matter
/// how badly the learner is doing.
pub const MIN_ACTIVE_COHORTS: usize = 2;

/// Default multiplier for the over-mastery deactivation heuristic
pub const DEFAULT_OVERMASTERY_FACTOR: f64 = 2.0;

// ==================== Errors ====================

/// Construction-time configuration errors.
///
/// Runtime misuse (updating a question the scheduler is not tracking,
/// updating the dimension model before any draw) is a programmer error
/// and panics instead; see the `# Panics` sections on the methods.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// EMA decay must satisfy `0 <= decay < 1` so that `limit = 1/(1-decay)` exists
    #[error("decay must be in [0, 1), got {0}")]
    InvalidDecay(f64),

    /// Score threshold must be positive
    #[error("score threshold must be positive, got {0}")]
    InvalidThreshold(f64),

    /// Age weighting must be positive
    #[error("age weighting must be positive, got {0}")]
    InvalidAgeWeighting(f64),

    /// Over-mastery factor must be positive
    #[error("over-mastery factor must be positive, got {0}")]
    InvalidOvermasteryFactor(f64),

    /// Backlog too short to seed the initial active set
    #[error("backlog has {got} cohorts but {need} are required to start")]
    ShortBacklog {
        /// Cohorts supplied
        got: usize,
        /// Cohorts needed for the initial active set
        need: usize,
    },

    /// A backlog cohort with no questions can never be drawn from
    #[error("backlog cohort {0} is empty")]
    EmptyCohort(usize),

    /// A dimension tree needs at least one first-level variant
    #[error("dimension tree has no variants")]
    EmptyTree,
}

// ==================== Question Contracts ====================

/// An opaque question token for the flat scheduler.
///
/// The scheduler never constructs musical content. It tracks scores
/// against question identities and asks the token itself to project the
/// pool of active identities into presentable multiple-choice options
/// (e.g. the same interval re-rooted to match the expected question).
pub trait Question: Clone + Eq + Hash {
    /// Human-readable name, e.g. `"m3"` or `"Minor triad"`.
    fn label(&self) -> String;

    /// Project the active pool into the options to present alongside
    /// this question. Implementations typically re-key the pool's
    /// variants onto this question's context (same root, same octave).
    fn options(&self, pool: &[Self]) -> Vec<Self>;
}

/// A composite question for the dimension-tree model.
///
/// Each attribute (chord type, root note, octave, ...) is one field the
/// tree assigns while walking root to leaf. `Value` is the caller's
/// attribute-value type, usually an enum over all attribute kinds.
pub trait CompositeQuestion: Clone + Default {
    /// Attribute value type shared by every field of the question.
    type Value: Clone + PartialEq;

    /// Assign `value` to the named attribute.
    fn set(&mut self, field: &str, value: &Self::Value);

    /// Read the named attribute back, if it has been assigned.
    fn get(&self, field: &str) -> Option<Self::Value>;
}

// ==================== Scheduler Interface ====================

/// Common capability set of every scheduling model: draw a question,
/// enumerate its options, report the learner's answer.
///
/// `draw` and `update` are called strictly alternately from a single
/// control loop; implementations hold no locks and assume exclusive
/// single-session ownership.
pub trait QuizScheduler<Q> {
    /// Pick the next question to ask.
    fn draw(&mut self) -> Q;

    /// The multiple-choice alternatives to present with `expected`.
    fn options(&self, expected: &Q) -> Vec<Q>;

    /// Record the learner's `choice` against the `expected` answer.
    fn update(&mut self, choice: &Q, expected: &Q);
}

// ==================== Configuration ====================

/// How raw score headroom is turned into a selection weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    /// Weight = `limit - score`
    Linear,
    /// Weight = `(limit - score)^2`; over-samples weak questions more
    /// aggressively and is the default.
    #[default]
    Squared,
}

/// Score a constant streak of `n` correct answers reaches from zero:
/// `(1 - decay^n) / (1 - decay)`.
///
/// Used to express an activation threshold as "get each question right
/// `n` times in a row" instead of a raw score.
pub fn threshold_for_streak(decay: f64, n: u32) -> f64 {
    (1.0 - decay.powi(n as i32)) / (1.0 - decay)
}

/// Per-question diagnostic line in a [`SchedulerStatus`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionStatus {
    /// The question's label
    pub label: String,
    /// Current EMA score
    pub score: f64,
    /// Value of the draw counter when this question was last drawn
    pub last_asked: u64,
}

/// Snapshot of scheduler state for display or logging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Number of active cohorts
    pub active_cohorts: usize,
    /// Cohorts never yet activated
    pub backlog_remaining: usize,
    /// Cohorts currently retired by the plus-minus policy
    pub deactivated: usize,
    /// Aggregate points still needed before the next activation fires
    pub points_to_next: f64,
    /// Per-question scores, in activation order
    pub questions: Vec<QuestionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_for_streak_matches_ema_algebra() {
        // decay 0.5: 1, 1.5, 1.75, ... -> 2.0
        assert!((threshold_for_streak(0.5, 1) - 1.0).abs() < 1e-12);
        assert!((threshold_for_streak(0.5, 2) - 1.5).abs() < 1e-12);
        assert!((threshold_for_streak(0.5, 3) - 1.75).abs() < 1e-12);
        assert!((threshold_for_streak(0.5, 10) - 1.998046875).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_for_streak_zero_decay() {
        // With no memory of past answers the streak score is always 1.
        assert_eq!(threshold_for_streak(0.0, 1), 1.0);
        assert_eq!(threshold_for_streak(0.0, 7), 1.0);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidDecay(1.5);
        assert_eq!(err.to_string(), "decay must be in [0, 1), got 1.5");

        let err = ConfigError::ShortBacklog { got: 1, need: 2 };
        assert_eq!(
            err.to_string(),
            "backlog has 1 cohorts but 2 are required to start"
        );
    }

    #[test]
    fn test_status_serde_round_trip() {
        let status = SchedulerStatus {
            active_cohorts: 2,
            backlog_remaining: 3,
            deactivated: 0,
            points_to_next: 1.5,
            questions: vec![QuestionStatus {
                label: "m3".to_string(),
                score: 0.5,
                last_asked: 4,
            }],
        };
        let json = serde_json::to_string(&status).unwrap();
        let back: SchedulerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.active_cohorts, 2);
        assert_eq!(back.questions[0].label, "m3");
    }
}
