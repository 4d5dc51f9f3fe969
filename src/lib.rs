//! # eartrain-algo - Adaptive quiz scheduling
//!
//! Pure-Rust scheduling core for ear-training quizzes: given an ordered
//! backlog of musical questions, decide round after round which concept
//! to test next, introduce new material as mastery is demonstrated, and
//! bias re-testing toward the concepts the learner keeps missing.
//!
//! The crate knows nothing about audio, MIDI, or rendering. Questions
//! are opaque caller-defined tokens; the scheduler only tracks scores
//! against their identities.
//!
//! ## Models
//!
//! - [`Scheduler`] - flat active set. Questions (or whole sets of
//!   questions) activate in backlog order once everything active clears
//!   a score threshold; draws are weighted toward low scores and,
//!   optionally, long-unseen questions. Activation strategy is chosen
//!   by [`PolicyKind`]: grow-only, or grow-and-shrink with a hard floor
//!   of two active cohorts.
//! - [`DimensionTree`] / [`DimensionScheduler`] - hierarchical
//!   alternative for composite questions: each tree level assigns one
//!   attribute (chord type, root note, octave) and new variants unlock
//!   strictly in declaration order as their siblings are mastered.
//!
//! Both models speak the same [`QuizScheduler`] interface: `draw`,
//! `options`, `update`, called strictly alternately from one quiz loop.
//!
//! ## Scoring
//!
//! All scores are exponential moving averages `score = score * decay +
//! delta` with `delta = +1` on a correct first attempt and `-1` for both
//! sides of a wrong answer (the confused pair is penalized together).
//! For `decay` in `[0, 1)` the EMA ceiling is `limit = 1 / (1 - decay)`;
//! selection weight comes from the remaining headroom `limit - score`.
//!
//! ## Example
//!
//! ```rust
//! use eartrain_algo::{Question, Scheduler, SchedulerConfig};
//!
//! #[derive(Clone, Debug, PartialEq, Eq, Hash)]
//! struct Interval(u8);
//!
//! impl Question for Interval {
//!     fn label(&self) -> String {
//!         format!("{} semitones", self.0)
//!     }
//!
//!     fn options(&self, pool: &[Self]) -> Vec<Self> {
//!         pool.to_vec()
//!     }
//! }
//!
//! # fn main() -> Result<(), eartrain_algo::ConfigError> {
//! let questions = (1u8..=12).map(Interval).collect();
//! let mut scheduler = Scheduler::from_questions(questions, SchedulerConfig::default())?;
//!
//! let expected = scheduler.draw();
//! let options = scheduler.options(&expected);
//! // ...present the options, play the question, read the answer...
//! let choice = options[0].clone();
//! scheduler.update(&choice, &expected);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod activation;
pub mod dimensions;
pub mod sampling;
pub mod scheduler;
pub mod tracker;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export the shared contracts and configuration types
pub use types::{
    threshold_for_streak, CompositeQuestion, ConfigError, Question, QuestionStatus, QuizScheduler,
    SchedulerStatus, Weighting,
};

/// Re-export the flat scheduler
pub use scheduler::{Scheduler, SchedulerConfig};

/// Re-export the activation policies
pub use activation::PolicyKind;

/// Re-export the score tracker
pub use tracker::{ScoreEntry, ScoreTracker};

/// Re-export the dimension-tree model
pub use dimensions::{
    DimensionConfig, DimensionPath, DimensionScheduler, DimensionSpec, DimensionTree,
};
