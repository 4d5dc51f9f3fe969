//! Question Scheduling
//!
//! The flat-active-set scheduler: draw a question weighted by how much
//! work it still needs, report the learner's answer, let the activation
//! policy grow (or shrink) the working set.
//!
//! Selection weights:
//! - base weight = `limit - score` (Linear) or `(limit - score)^2`
//!   (Squared, the default; over-samples weak questions harder)
//! - optionally multiplied by `age_weighting ^ (asked - last_asked)`,
//!   so long-dormant questions regain priority even when their raw
//!   score looks fine
//! - clamped to a positive floor before sampling
//!
//! The backlog is an ordered list of *cohorts* (sets of questions
//! activated together). Single-question scheduling is the special case
//! of one-element cohorts; see [`Scheduler::from_questions`].

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::activation::{ActiveSet, CohortStats, PolicyKind, Transition};
use crate::sampling::{default_rng, weighted_pick};
use crate::tracker::ScoreTracker;
use crate::types::{
    threshold_for_streak, ConfigError, Question, QuestionStatus, QuizScheduler, SchedulerStatus,
    Weighting, DEFAULT_DECAY, MIN_ACTIVE_COHORTS,
};

// ==================== Configuration ====================

/// Scheduler configuration.
///
/// The defaults reproduce the classic setup: decay 0.5 (limit 2),
/// threshold at a two-correct streak, two seed cohorts, grow-only
/// activation, squared weighting, no age weighting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// EMA decay factor, `0 <= decay < 1`
    pub decay: f64,
    /// Score every active question must reach before the next cohort
    /// activates (and, negated, the trouble trigger for plus-minus)
    pub score_threshold: f64,
    /// How score headroom becomes selection weight
    pub weighting: Weighting,
    /// Per-draw aging base, e.g. `1.01`; `None` disables recency
    /// weighting entirely
    pub age_weighting: Option<f64>,
    /// Cohorts activated at construction
    pub initial_active: usize,
    /// Activation strategy
    pub policy: PolicyKind,
    /// RNG seed for reproducible runs; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            score_threshold: threshold_for_streak(DEFAULT_DECAY, 2),
            weighting: Weighting::default(),
            age_weighting: None,
            initial_active: MIN_ACTIVE_COHORTS,
            policy: PolicyKind::default(),
            seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Configuration whose threshold demands `streak` consecutive
    /// correct answers per question: `(1 - decay^n) / (1 - decay)`.
    pub fn with_streak(decay: f64, streak: u32) -> Self {
        Self {
            decay,
            score_threshold: threshold_for_streak(decay, streak),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Decay is validated by the tracker constructor.
        if self.score_threshold <= 0.0 || self.score_threshold.is_nan() {
            return Err(ConfigError::InvalidThreshold(self.score_threshold));
        }
        if let Some(age) = self.age_weighting {
            if age <= 0.0 || age.is_nan() {
                return Err(ConfigError::InvalidAgeWeighting(age));
            }
        }
        Ok(())
    }
}

// ==================== Scheduler ====================

/// Adaptive scheduler over a flat active set of question cohorts.
///
/// `draw` and `update` are called strictly alternately from one quiz
/// loop; the scheduler assumes exclusive single-session ownership and
/// takes no locks.
#[derive(Clone, Debug)]
pub struct Scheduler<Q: Question> {
    backlog: Vec<Vec<Q>>,
    active: ActiveSet,
    tracker: ScoreTracker<Q>,
    score_threshold: f64,
    weighting: Weighting,
    age_weighting: Option<f64>,
    /// Total draws so far, the clock for age weighting
    asked: u64,
    /// Whether the current round has already seen a wrong answer
    round_missed: bool,
    rng: ChaCha8Rng,
}

impl<Q: Question> Scheduler<Q> {
    /// Build a scheduler over an ordered backlog of cohorts.
    ///
    /// The first `initial_active` cohorts are activated immediately;
    /// the rest wait for the activation policy. Cohort order should
    /// make pedagogic sense (easiest material first) since it is
    /// consumed strictly left to right.
    pub fn new(backlog: Vec<Vec<Q>>, config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(idx) = backlog.iter().position(Vec::is_empty) {
            return Err(ConfigError::EmptyCohort(idx));
        }
        let tracker = ScoreTracker::new(config.decay)?;
        let active = ActiveSet::new(config.policy, backlog.len(), config.initial_active)?;

        let mut scheduler = Self {
            backlog,
            active,
            tracker,
            score_threshold: config.score_threshold,
            weighting: config.weighting,
            age_weighting: config.age_weighting,
            asked: 0,
            round_missed: false,
            rng: match config.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => default_rng(),
            },
        };
        for idx in scheduler.active.active().to_vec() {
            scheduler.track_cohort(idx);
        }
        Ok(scheduler)
    }

    /// Build a scheduler that activates one question at a time.
    pub fn from_questions(questions: Vec<Q>, config: SchedulerConfig) -> Result<Self, ConfigError> {
        Self::new(questions.into_iter().map(|q| vec![q]).collect(), config)
    }

    /// Theoretical EMA ceiling, `1 / (1 - decay)`.
    pub fn limit(&self) -> f64 {
        self.tracker.limit()
    }

    /// Number of individual active questions.
    pub fn active_len(&self) -> usize {
        self.tracker.len()
    }

    /// Active question identities in activation order. This is the
    /// pool handed to [`Question::options`].
    pub fn active_pool(&self) -> Vec<Q> {
        self.tracker.questions().cloned().collect()
    }

    /// Current score of an active question.
    ///
    /// # Panics
    ///
    /// Panics if `question` is not active.
    pub fn score(&self, question: &Q) -> f64 {
        self.tracker.score(question)
    }

    /// Pick the next question, activating a new cohort first if the
    /// policy says every current question is mastered.
    pub fn draw(&mut self) -> Q {
        self.maybe_transition();

        let pool = self.active_pool();
        let mut weights: Vec<f64> = pool.iter().map(|q| self.weight_of(q)).collect();
        for (q, w) in pool.iter().zip(&weights) {
            trace!(question = %q.label(), weight = *w, "draw weight");
        }

        // The pool is never empty: the floor keeps at least two
        // cohorts active and cohorts are non-empty by construction.
        let idx = weighted_pick(&mut self.rng, &mut weights)
            .unwrap_or_else(|| panic!("active pool is empty"));
        let question = pool[idx].clone();

        self.asked += 1;
        self.tracker.mark_asked(&question, self.asked);
        self.round_missed = false;
        question
    }

    /// Multiple-choice alternatives to present with `expected`,
    /// projected by the question itself from the active pool.
    pub fn options(&self, expected: &Q) -> Vec<Q> {
        expected.options(&self.active_pool())
    }

    /// Record the learner's answer.
    ///
    /// A correct choice scores `+1`, but only on the round's first
    /// attempt; retries after a miss no longer earn points. A wrong
    /// choice penalizes both the chosen and the expected question,
    /// marking the pair as confusable. The activation policy is then
    /// re-evaluated.
    ///
    /// # Panics
    ///
    /// Panics if `choice` or `expected` is not an active question.
    pub fn update(&mut self, choice: &Q, expected: &Q) {
        if choice == expected {
            if !self.round_missed {
                self.tracker.record_correct(expected);
            }
            // A correct answer ends the round.
            self.round_missed = false;
        } else {
            self.tracker.record_wrong(choice);
            self.tracker.record_wrong(expected);
            self.round_missed = true;
        }
        self.maybe_transition();
    }

    /// Diagnostic snapshot for display or logging.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            active_cohorts: self.active.active().len(),
            backlog_remaining: self.active.backlog_remaining(),
            deactivated: self.active.deactivated_count(),
            points_to_next: self.tracker.headroom_to(self.score_threshold),
            questions: self
                .tracker
                .questions()
                .map(|q| {
                    let entry = self.tracker.get(q).copied().unwrap_or_default();
                    QuestionStatus {
                        label: q.label(),
                        score: entry.score,
                        last_asked: entry.last_asked,
                    }
                })
                .collect(),
        }
    }

    // ==================== Internals ====================

    fn weight_of(&self, question: &Q) -> f64 {
        let entry = match self.tracker.get(question) {
            Some(entry) => entry,
            None => return 0.0,
        };
        let headroom = self.tracker.limit() - entry.score;
        let base = match self.weighting {
            Weighting::Linear => headroom,
            Weighting::Squared => headroom * headroom,
        };
        match self.age_weighting {
            Some(age) => base * age.powf((self.asked - entry.last_asked) as f64),
            None => base,
        }
    }

    fn maybe_transition(&mut self) {
        let stats = self.stats();
        match self.active.evaluate(&stats) {
            Transition::Activated(idx) => {
                debug!(cohort = idx, "activating cohort");
                self.track_cohort(idx);
                self.tracker.reset_all();
            }
            Transition::Deactivated(idx) => {
                debug!(cohort = idx, "retiring cohort");
                for q in self.backlog[idx].clone() {
                    self.tracker.remove(&q);
                }
                self.tracker.reset_all();
            }
            Transition::None => {}
        }
    }

    fn track_cohort(&mut self, idx: usize) {
        for q in self.backlog[idx].clone() {
            self.tracker.activate(q, self.asked);
        }
    }

    fn stats(&self) -> CohortStats {
        let cohort_scores = self
            .active
            .active()
            .iter()
            .map(|&idx| {
                let cohort = &self.backlog[idx];
                let sum: f64 = cohort.iter().map(|q| self.tracker.score(q)).sum();
                sum / cohort.len() as f64
            })
            .collect();
        CohortStats {
            all_at_threshold: self.tracker.all_at_least(self.score_threshold),
            any_below_neg_threshold: self.tracker.any_at_most(-self.score_threshold),
            headroom: self.tracker.headroom_to(self.score_threshold),
            cohort_scores,
        }
    }
}

impl<Q: Question> QuizScheduler<Q> for Scheduler<Q> {
    fn draw(&mut self) -> Q {
        Scheduler::draw(self)
    }

    fn options(&self, expected: &Q) -> Vec<Q> {
        Scheduler::options(self, expected)
    }

    fn update(&mut self, choice: &Q, expected: &Q) {
        Scheduler::update(self, choice, expected)
    }
}
