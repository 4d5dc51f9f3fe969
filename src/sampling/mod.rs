//! Weighted Sampling
//!
//! Numerical guards around `rand`'s weighted choice.
//!
//! Selection weights are computed as score headroom (`limit - score`)
//! and are supposed to stay positive, but age-weighting exponents and
//! pathological decay settings can push individual weights to zero or
//! below. Negative or all-zero weight vectors crash the sampler, so
//! every weight is clamped to a small positive floor first.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::types::MIN_WEIGHT;

/// Clamp raw weights so the vector is safe to sample from: every entry
/// becomes at least [`MIN_WEIGHT`], and NaN collapses to the floor.
pub fn clamp_weights(weights: &mut [f64]) {
    for w in weights.iter_mut() {
        if !w.is_finite() || *w < MIN_WEIGHT {
            *w = MIN_WEIGHT;
        }
    }
}

/// Pick an index by weighted random choice over clamped weights.
///
/// Returns `None` only for an empty weight vector.
pub fn weighted_pick(rng: &mut ChaCha8Rng, weights: &mut [f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    clamp_weights(weights);
    // Cannot fail after clamping: all weights are positive and finite.
    let dist = WeightedIndex::new(weights.iter().copied()).ok()?;
    Some(dist.sample(rng))
}

/// A deterministic RNG seeded from the system clock, for callers that
/// do not care about reproducibility.
pub fn default_rng() -> ChaCha8Rng {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42);
    ChaCha8Rng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_weights_floors_bad_values() {
        let mut weights = [1.0, 0.0, -3.0, f64::NAN, f64::INFINITY];
        clamp_weights(&mut weights);
        assert_eq!(weights[0], 1.0);
        assert_eq!(weights[1], MIN_WEIGHT);
        assert_eq!(weights[2], MIN_WEIGHT);
        assert_eq!(weights[3], MIN_WEIGHT);
        assert_eq!(weights[4], MIN_WEIGHT);
    }

    #[test]
    fn test_weighted_pick_all_zero_does_not_fail() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut weights = [0.0, 0.0, 0.0];
        for _ in 0..50 {
            let idx = weighted_pick(&mut rng, &mut weights).unwrap();
            assert!(idx < 3);
        }
    }

    #[test]
    fn test_weighted_pick_empty_is_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(weighted_pick(&mut rng, &mut []), None);
    }

    #[test]
    fn test_weighted_pick_prefers_heavy_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut heavy = 0usize;
        for _ in 0..1000 {
            let mut weights = [1.0, 99.0];
            if weighted_pick(&mut rng, &mut weights) == Some(1) {
                heavy += 1;
            }
        }
        // Expected ~990 of 1000.
        assert!(heavy > 900, "heavy index picked only {} times", heavy);
    }
}
