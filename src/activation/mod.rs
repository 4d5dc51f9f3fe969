//! Activation Policies
//!
//! Decide when new question cohorts enter the rotation and, under the
//! plus-minus policy, when mastered cohorts leave it.
//!
//! Policies operate on cohort *indices* into an immutable backlog; an
//! explicit cursor replaces the consumed-iterator bookkeeping of older
//! designs so runs are replayable. The scheduler owns the scores and
//! feeds each evaluation a [`CohortStats`] summary, then applies the
//! returned [`Transition`] to its score book.
//!
//! Two invariants hold for every policy:
//! - the active set never shrinks below [`MIN_ACTIVE_COHORTS`];
//! - every transition is followed by a full score reset, so a new
//!   cohort is always tested under the same conditions as the old ones.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ConfigError, DEFAULT_OVERMASTERY_FACTOR, MIN_ACTIVE_COHORTS};

/// Which activation strategy the scheduler runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PolicyKind {
    /// Activate the next backlog cohort once every active score clears
    /// the threshold; never retire anything.
    #[default]
    GrowOnly,
    /// Grow as above, but also retire the best-known cohort when some
    /// question falls below the negative threshold, keeping the
    /// learner's working set small. Retired cohorts come back
    /// most-recent-first when everything is mastered again.
    PlusMinus {
        /// When set, additionally retire the top cohort once its score
        /// exceeds `factor` times the aggregate headroom to the
        /// threshold. A tunable over-mastery heuristic, off by default.
        overmastery_factor: Option<f64>,
    },
}

impl PolicyKind {
    /// Plus-minus policy with the over-mastery heuristic enabled at
    /// its default factor.
    pub fn plus_minus_with_overmastery() -> Self {
        Self::PlusMinus {
            overmastery_factor: Some(DEFAULT_OVERMASTERY_FACTOR),
        }
    }
}

/// Score summary for one policy evaluation, in `active()` order.
#[derive(Clone, Debug)]
pub struct CohortStats {
    /// Every active question's score is at or above the threshold
    pub all_at_threshold: bool,
    /// Some active question's score is at or below minus the threshold
    pub any_below_neg_threshold: bool,
    /// Sum over active questions of `max(0, threshold - score)`
    pub headroom: f64,
    /// Mean score of each active cohort, aligned with `active()`
    pub cohort_scores: Vec<f64>,
}

/// Outcome of a policy evaluation, to be applied to the score book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Cohort at this backlog index joins the active set; reset all scores.
    Activated(usize),
    /// Cohort at this backlog index leaves the active set; drop its
    /// entries and reset the remaining scores.
    Deactivated(usize),
    /// Nothing changed.
    None,
}

/// Active-set state machine shared by both policies.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    kind: PolicyKind,
    /// Active backlog indices, kept sorted ascending
    active: Vec<usize>,
    /// LIFO stack of retired indices (plus-minus only)
    deactivated: Vec<usize>,
    /// Next never-activated backlog index
    cursor: usize,
    backlog_len: usize,
    floor: usize,
}

impl ActiveSet {
    /// Seed the first `initial` cohorts from a backlog of `backlog_len`.
    pub fn new(kind: PolicyKind, backlog_len: usize, initial: usize) -> Result<Self, ConfigError> {
        let floor = initial.max(MIN_ACTIVE_COHORTS);
        if backlog_len < floor {
            return Err(ConfigError::ShortBacklog {
                got: backlog_len,
                need: floor,
            });
        }
        if let PolicyKind::PlusMinus {
            overmastery_factor: Some(f),
        } = kind
        {
            if f <= 0.0 || f.is_nan() {
                return Err(ConfigError::InvalidOvermasteryFactor(f));
            }
        }
        Ok(Self {
            kind,
            active: (0..floor).collect(),
            deactivated: Vec::new(),
            cursor: floor,
            backlog_len,
            floor,
        })
    }

    /// Currently active backlog indices, ascending.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Cohorts never yet activated.
    pub fn backlog_remaining(&self) -> usize {
        self.backlog_len - self.cursor
    }

    /// Cohorts currently retired.
    pub fn deactivated_count(&self) -> usize {
        self.deactivated.len()
    }

    /// Evaluate the policy against the current scores.
    ///
    /// At most one transition fires per evaluation; the triggers are
    /// checked in priority order (grow, shrink, over-mastery).
    pub fn evaluate(&mut self, stats: &CohortStats) -> Transition {
        debug_assert_eq!(stats.cohort_scores.len(), self.active.len());

        if stats.all_at_threshold {
            return match self.next_to_activate() {
                Some(idx) => {
                    debug!(cohort = idx, "all questions above threshold, activating");
                    self.active.push(idx);
                    self.active.sort_unstable();
                    Transition::Activated(idx)
                }
                // Backlog exhausted: keep serving the final set.
                None => Transition::None,
            };
        }

        if let PolicyKind::PlusMinus { overmastery_factor } = self.kind {
            if self.active.len() > self.floor {
                if stats.any_below_neg_threshold {
                    let idx = self.top_cohort(stats);
                    debug!(cohort = idx, "question below negative threshold, retiring top cohort");
                    return self.deactivate(idx);
                }
                if let Some(factor) = overmastery_factor {
                    let (pos, idx) = self.top_cohort_with_pos(stats);
                    if stats.cohort_scores[pos] > factor * stats.headroom {
                        debug!(cohort = idx, "over-mastered, retiring top cohort");
                        return self.deactivate(idx);
                    }
                }
            }
        }

        Transition::None
    }

    /// Most recently retired cohort, else the next fresh backlog index.
    fn next_to_activate(&mut self) -> Option<usize> {
        if let Some(idx) = self.deactivated.pop() {
            return Some(idx);
        }
        if self.cursor < self.backlog_len {
            let idx = self.cursor;
            self.cursor += 1;
            return Some(idx);
        }
        None
    }

    fn deactivate(&mut self, idx: usize) -> Transition {
        self.active.retain(|&i| i != idx);
        self.deactivated.push(idx);
        Transition::Deactivated(idx)
    }

    /// Highest-scoring active cohort; ties go to the higher index.
    fn top_cohort(&self, stats: &CohortStats) -> usize {
        self.top_cohort_with_pos(stats).1
    }

    fn top_cohort_with_pos(&self, stats: &CohortStats) -> (usize, usize) {
        let mut best = (0usize, self.active[0]);
        for (pos, (&idx, &score)) in self.active.iter().zip(&stats.cohort_scores).enumerate() {
            let (best_pos, best_idx) = best;
            let best_score = stats.cohort_scores[best_pos];
            if score > best_score || (score == best_score && idx > best_idx) {
                best = (pos, idx);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(all: bool, any_neg: bool, headroom: f64, scores: &[f64]) -> CohortStats {
        CohortStats {
            all_at_threshold: all,
            any_below_neg_threshold: any_neg,
            headroom,
            cohort_scores: scores.to_vec(),
        }
    }

    #[test]
    fn test_seeds_initial_cohorts() {
        let set = ActiveSet::new(PolicyKind::GrowOnly, 5, 2).unwrap();
        assert_eq!(set.active(), &[0, 1]);
        assert_eq!(set.backlog_remaining(), 3);
    }

    #[test]
    fn test_rejects_short_backlog() {
        assert_eq!(
            ActiveSet::new(PolicyKind::GrowOnly, 1, 2).unwrap_err(),
            ConfigError::ShortBacklog { got: 1, need: 2 }
        );
    }

    #[test]
    fn test_grow_only_activates_in_order_then_stops() {
        let mut set = ActiveSet::new(PolicyKind::GrowOnly, 3, 2).unwrap();
        assert_eq!(
            set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0])),
            Transition::Activated(2)
        );
        assert_eq!(set.active(), &[0, 1, 2]);
        // Backlog exhausted: silent no-op forever after.
        assert_eq!(
            set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0, 2.0])),
            Transition::None
        );
        assert_eq!(set.active(), &[0, 1, 2]);
    }

    #[test]
    fn test_grow_only_never_retires() {
        let mut set = ActiveSet::new(PolicyKind::GrowOnly, 4, 2).unwrap();
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        assert_eq!(
            set.evaluate(&stats(false, true, 4.0, &[-2.0, -2.0, -2.0])),
            Transition::None
        );
        assert_eq!(set.active().len(), 3);
    }

    #[test]
    fn test_plus_minus_retires_top_scorer_on_trouble() {
        let kind = PolicyKind::PlusMinus {
            overmastery_factor: None,
        };
        let mut set = ActiveSet::new(kind, 5, 2).unwrap();
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        assert_eq!(set.active(), &[0, 1, 2]);

        // Cohort 1 is doing best; retire it.
        assert_eq!(
            set.evaluate(&stats(false, true, 4.0, &[-1.5, 1.8, 0.2])),
            Transition::Deactivated(1)
        );
        assert_eq!(set.active(), &[0, 2]);
        assert_eq!(set.deactivated_count(), 1);
    }

    #[test]
    fn test_plus_minus_floor_holds() {
        let kind = PolicyKind::PlusMinus {
            overmastery_factor: None,
        };
        let mut set = ActiveSet::new(kind, 5, 2).unwrap();
        // Only two cohorts active: trouble must not shrink the set.
        assert_eq!(
            set.evaluate(&stats(false, true, 3.0, &[-2.0, 1.9])),
            Transition::None
        );
        assert_eq!(set.active(), &[0, 1]);
    }

    #[test]
    fn test_plus_minus_reactivates_lifo() {
        let kind = PolicyKind::PlusMinus {
            overmastery_factor: None,
        };
        let mut set = ActiveSet::new(kind, 9, 2).unwrap();
        // Grow to {0,1,2,3}.
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0, 2.0]));
        // Retire 3 then 2.
        set.evaluate(&stats(false, true, 4.0, &[0.0, 0.0, 0.0, 1.0]));
        set.evaluate(&stats(false, true, 4.0, &[0.0, 0.0, 1.0]));
        assert_eq!(set.active(), &[0, 1]);
        // Mastery brings back the most recently retired first.
        assert_eq!(
            set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0])),
            Transition::Activated(2)
        );
        assert_eq!(
            set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0, 2.0])),
            Transition::Activated(3)
        );
        // Stack empty: fresh cohort next.
        assert_eq!(
            set.evaluate(&stats(true, false, 0.0, &[2.0; 4])),
            Transition::Activated(4)
        );
    }

    #[test]
    fn test_tie_breaks_to_higher_index() {
        let kind = PolicyKind::PlusMinus {
            overmastery_factor: None,
        };
        let mut set = ActiveSet::new(kind, 5, 2).unwrap();
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        assert_eq!(
            set.evaluate(&stats(false, true, 4.0, &[1.0, 1.0, -1.6])),
            Transition::Deactivated(1)
        );
    }

    #[test]
    fn test_overmastery_heuristic() {
        let kind = PolicyKind::plus_minus_with_overmastery();
        let mut set = ActiveSet::new(kind, 5, 2).unwrap();
        set.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        // Top score 1.9 > 2.0 * headroom 0.5: retire it even though
        // nothing has gone negative.
        assert_eq!(
            set.evaluate(&stats(false, false, 0.5, &[1.9, 1.2, 1.3])),
            Transition::Deactivated(0)
        );
        // Disabled heuristic leaves the same stats alone.
        let mut plain = ActiveSet::new(
            PolicyKind::PlusMinus {
                overmastery_factor: None,
            },
            5,
            2,
        )
        .unwrap();
        plain.evaluate(&stats(true, false, 0.0, &[2.0, 2.0]));
        assert_eq!(
            plain.evaluate(&stats(false, false, 0.5, &[1.9, 1.2, 1.3])),
            Transition::None
        );
    }
}
