//! Score Tracking
//!
//! Per-question exponential moving average scores.
//!
//! Core rule: `score = score * decay + delta`, with `delta = +1` for a
//! correct first-attempt answer and `-1` for every wrong attribution.
//! For `decay` in `[0, 1)` a constant stream of correct answers
//! converges on `limit = 1 / (1 - decay)`; the scheduler turns the
//! remaining headroom `limit - score` into selection weight, so the
//! limit algebra is exact, not an approximation.

use std::collections::HashMap;
use std::hash::Hash;

use crate::types::ConfigError;

/// Score state for one active question.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreEntry {
    /// Exponential moving average score
    pub score: f64,
    /// Value of the draw counter when this question was last drawn
    pub last_asked: u64,
}

/// EMA score book for the currently active questions.
///
/// Entries exist only for active questions. Looking up or updating a
/// question without an entry is a caller bug and panics; silently
/// creating entries would mask stale tokens leaking across activation
/// resets.
#[derive(Clone, Debug)]
pub struct ScoreTracker<Q> {
    entries: HashMap<Q, ScoreEntry>,
    /// Activation order, for deterministic iteration and weighting
    order: Vec<Q>,
    decay: f64,
    limit: f64,
}

impl<Q: Clone + Eq + Hash> ScoreTracker<Q> {
    /// Create a tracker.
    ///
    /// `decay` must be in `[0, 1)`; the EMA limit `1 / (1 - decay)` is
    /// undefined otherwise.
    pub fn new(decay: f64) -> Result<Self, ConfigError> {
        if !(0.0..1.0).contains(&decay) || decay.is_nan() {
            return Err(ConfigError::InvalidDecay(decay));
        }
        Ok(Self {
            entries: HashMap::new(),
            order: Vec::new(),
            decay,
            limit: 1.0 / (1.0 - decay),
        })
    }

    /// The configured decay factor.
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Theoretical EMA ceiling, `1 / (1 - decay)`.
    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Number of tracked questions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `question` currently has an entry.
    pub fn contains(&self, question: &Q) -> bool {
        self.entries.contains_key(question)
    }

    /// Start tracking `question` at score 0. No-op if already tracked.
    pub fn activate(&mut self, question: Q, now: u64) {
        if self.entries.contains_key(&question) {
            return;
        }
        self.entries.insert(
            question.clone(),
            ScoreEntry {
                score: 0.0,
                last_asked: now,
            },
        );
        self.order.push(question);
    }

    /// Stop tracking `question`, returning its last entry.
    pub fn remove(&mut self, question: &Q) -> Option<ScoreEntry> {
        let entry = self.entries.remove(question)?;
        self.order.retain(|q| q != question);
        Some(entry)
    }

    /// Tracked questions in activation order.
    pub fn questions(&self) -> impl Iterator<Item = &Q> {
        self.order.iter()
    }

    /// Entry for `question`, if tracked.
    pub fn get(&self, question: &Q) -> Option<&ScoreEntry> {
        self.entries.get(question)
    }

    /// Current score of `question`.
    ///
    /// # Panics
    ///
    /// Panics if `question` is not tracked.
    pub fn score(&self, question: &Q) -> f64 {
        self.entry(question).score
    }

    /// Apply a `+1` EMA step: the learner got `question` right.
    ///
    /// # Panics
    ///
    /// Panics if `question` is not tracked.
    pub fn record_correct(&mut self, question: &Q) {
        let decay = self.decay;
        let entry = self.entry_mut(question);
        entry.score = entry.score * decay + 1.0;
    }

    /// Apply a `-1` EMA step: `question` was either missed or offered
    /// as the wrongly chosen option. Both directions make the question
    /// more likely to be asked again.
    ///
    /// # Panics
    ///
    /// Panics if `question` is not tracked.
    pub fn record_wrong(&mut self, question: &Q) {
        let decay = self.decay;
        let entry = self.entry_mut(question);
        entry.score = entry.score * decay - 1.0;
    }

    /// Note that `question` was just drawn at draw-counter value `now`.
    ///
    /// # Panics
    ///
    /// Panics if `question` is not tracked.
    pub fn mark_asked(&mut self, question: &Q, now: u64) {
        self.entry_mut(question).last_asked = now;
    }

    /// Reset every tracked score to exactly 0, keeping the entries.
    ///
    /// Activation transitions call this so new material is tested under
    /// the same conditions as old material.
    pub fn reset_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.score = 0.0;
        }
    }

    /// True when every tracked score is at least `threshold`.
    /// Vacuously true when nothing is tracked.
    pub fn all_at_least(&self, threshold: f64) -> bool {
        self.entries.values().all(|e| e.score >= threshold)
    }

    /// True when any tracked score is at most `threshold`.
    pub fn any_at_most(&self, threshold: f64) -> bool {
        self.entries.values().any(|e| e.score <= threshold)
    }

    /// Total points still needed to lift every score to `threshold`.
    pub fn headroom_to(&self, threshold: f64) -> f64 {
        self.entries
            .values()
            .map(|e| (threshold - e.score).max(0.0))
            .sum()
    }

    fn entry(&self, question: &Q) -> &ScoreEntry {
        self.entries
            .get(question)
            .unwrap_or_else(|| panic!("{}", UNTRACKED))
    }

    fn entry_mut(&mut self, question: &Q) -> &mut ScoreEntry {
        self.entries
            .get_mut(question)
            .unwrap_or_else(|| panic!("{}", UNTRACKED))
    }
}

const UNTRACKED: &str =
    "question is not tracked; the caller passed a stale or foreign token (tokens do not survive deactivation)";
