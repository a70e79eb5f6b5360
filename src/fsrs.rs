//! FSRS-style card memory model.
//!
//! Pure computations over a 21-weight parameter snapshot:
//! forgetting curve, difficulty/stability updates on recall and lapse,
//! same-day re-exposure, interval solving, and a per-review online
//! weight nudge. All intermediates are clamped immediately so no rating
//! sequence can push a value out of bounds.

use crate::card::{Card, Rating};

/// Smallest representable stability; below this the memory is undefined
pub const S_MIN: f64 = 0.001;

/// Largest stability in days (~100 years)
pub const S_MAX: f64 = 36500.0;

/// Step size for the per-review weight nudge
const LEARNING_RATE: f64 = 0.0005;

/// FSRS-6 published default weights
pub const DEFAULT_WEIGHTS: [f64; 21] = [
    0.212, 1.2931, 2.3065, 8.2956, 6.4133, 0.8334, 3.0194, 0.001, 1.8722, 0.1666, 0.796, 1.4835,
    0.0614, 0.2629, 1.6483, 0.6014, 1.8729, 0.5425, 0.0912, 0.0658, 0.1542,
];

/// Per-index clamp bounds; no weight ever leaves its bound
pub const PARAM_BOUNDS: [(f64, f64); 21] = [
    (S_MIN, 100.0), // w0: initial stability, Again
    (S_MIN, 100.0), // w1: initial stability, Hard
    (S_MIN, 100.0), // w2: initial stability, Good
    (S_MIN, 100.0), // w3: initial stability, Easy
    (1.0, 10.0),    // w4: initial difficulty base
    (0.001, 4.0),   // w5: initial difficulty grade scale
    (0.001, 4.0),   // w6: difficulty delta per grade
    (0.001, 0.75),  // w7: difficulty mean-reversion weight
    (0.0, 4.5),     // w8: recall stability growth base
    (0.0, 0.8),     // w9: recall stability saturation
    (0.001, 3.5),   // w10: recall retrievability effect
    (0.001, 5.0),   // w11: forget stability base
    (0.001, 0.25),  // w12: forget difficulty effect
    (0.001, 0.9),   // w13: forget stability effect
    (0.0, 4.0),     // w14: forget retrievability effect
    (0.0, 1.0),     // w15: hard penalty
    (1.0, 6.0),     // w16: easy bonus
    (0.0, 2.0),     // w17: short-term grade scale
    (0.0, 2.0),     // w18: short-term grade offset
    (0.0, 0.8),     // w19: short-term stability saturation
    (0.1, 0.8),     // w20: forgetting curve decay
];

fn clamp_weights(mut weights: [f64; 21]) -> [f64; 21] {
    for (w, (min, max)) in weights.iter_mut().zip(PARAM_BOUNDS.iter()) {
        if !w.is_finite() {
            *w = *min;
        } else {
            *w = w.clamp(*min, *max);
        }
    }
    weights
}

/// Difficulty/stability pair produced by a state update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryState {
    pub stability: f64,
    pub difficulty: f64,
}

/// Parameter snapshot for the memory model.
///
/// Weights are global to a user, not per-deck. The decay exponent and
/// the retention factor are derived and refreshed whenever the weights
/// or target retention change, so the forgetting curve always crosses
/// the target retention at exactly t = stability.
#[derive(Debug, Clone, PartialEq)]
pub struct FsrsParams {
    weights: [f64; 21],
    target_retention: f64,
    decay: f64,
    factor: f64,
}

impl FsrsParams {
    pub fn new(weights: [f64; 21], target_retention: f64) -> Self {
        let mut params = Self {
            weights: clamp_weights(weights),
            target_retention: target_retention.clamp(0.5, 0.995),
            decay: 0.0,
            factor: 0.0,
        };
        params.refresh();
        params
    }

    pub fn with_retention(target_retention: f64) -> Self {
        Self::new(DEFAULT_WEIGHTS, target_retention)
    }

    fn refresh(&mut self) {
        self.decay = -self.weights[20];
        self.factor = (self.target_retention.ln() / self.decay).exp() - 1.0;
    }

    pub fn weights(&self) -> &[f64; 21] {
        &self.weights
    }

    pub fn target_retention(&self) -> f64 {
        self.target_retention
    }

    /// Probability of recall after `elapsed_days` at the given stability.
    ///
    /// Returns 0 when stability is at or below the floor (no memory yet).
    pub fn forgetting_curve(&self, elapsed_days: f64, stability: f64) -> f64 {
        if stability <= S_MIN {
            return 0.0;
        }
        (1.0 + self.factor * elapsed_days / stability)
            .powf(self.decay)
            .clamp(0.0, 1.0)
    }

    /// Stability after a brand-new card's first rating
    pub fn init_stability(&self, rating: Rating) -> f64 {
        self.weights[rating.index()].max(S_MIN)
    }

    /// Difficulty after a brand-new card's first rating
    pub fn init_difficulty(&self, rating: Rating) -> f64 {
        let g = rating.index() as f64;
        (self.weights[4] - ((g - 1.0) * self.weights[5]).exp() + 1.0).clamp(1.0, 10.0)
    }

    /// Grade-scaled linear damping followed by mean reversion toward the
    /// Easy-grade initial difficulty
    pub fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let delta = -self.weights[6] * (rating.value() - 3.0);
        let damped = difficulty + delta * (10.0 - difficulty) / 9.0;
        let target = self.init_difficulty(Rating::Easy);
        (self.weights[7] * target + (1.0 - self.weights[7]) * damped).clamp(1.0, 10.0)
    }

    /// Multiplicative stability growth after a successful multi-day recall
    pub fn next_recall_stability(
        &self,
        difficulty: f64,
        stability: f64,
        retrievability: f64,
        rating: Rating,
    ) -> f64 {
        let hard_penalty = if rating == Rating::Hard {
            self.weights[15]
        } else {
            1.0
        };
        let easy_bonus = if rating == Rating::Easy {
            self.weights[16]
        } else {
            1.0
        };
        let growth = self.weights[8].exp()
            * (11.0 - difficulty)
            * stability.powf(-self.weights[9])
            * (((1.0 - retrievability) * self.weights[10]).exp() - 1.0)
            * hard_penalty
            * easy_bonus;

        (stability * (1.0 + growth)).clamp(S_MIN, S_MAX)
    }

    /// Post-lapse stability; also bounds the Hard-after-lapse case
    pub fn next_forget_stability(&self, difficulty: f64, stability: f64, retrievability: f64) -> f64 {
        (self.weights[11]
            * difficulty.powf(-self.weights[12])
            * ((stability + 1.0).powf(self.weights[13]) - 1.0)
            * ((1.0 - retrievability) * self.weights[14]).exp())
        .clamp(S_MIN, S_MAX)
    }

    /// Stability after a same-day re-exposure. Successful grades never
    /// shrink stability; Again may.
    pub fn next_short_term_stability(&self, stability: f64, rating: Rating) -> f64 {
        let sinc = stability.powf(-self.weights[19])
            * (self.weights[17] * (rating.value() - 3.0 + self.weights[18])).exp();
        let multiplier = if rating >= Rating::Hard { sinc.max(1.0) } else { sinc };
        (stability * multiplier).clamp(S_MIN, S_MAX)
    }

    /// Full state transition for one graded review of a card.
    ///
    /// Unreviewed cards (or cards whose stability collapsed to the floor)
    /// get initial values. Again holds both fields; the short-interval
    /// re-entry is scheduled by the engine, not modeled here. Hard clamps
    /// the recall estimate down to the forget estimate, and a same-day
    /// Good/Easy uses the short-term estimate instead of the multi-day
    /// growth curve.
    pub fn next_state(&self, card: &Card, elapsed_days: f64, rating: Rating) -> MemoryState {
        if card.is_unreviewed() || card.stability <= S_MIN {
            return MemoryState {
                stability: self.init_stability(rating),
                difficulty: self.init_difficulty(rating),
            };
        }

        if rating == Rating::Again {
            return MemoryState {
                stability: card.stability,
                difficulty: card.difficulty,
            };
        }

        let retrievability = self.forgetting_curve(elapsed_days, card.stability);
        let recall =
            self.next_recall_stability(card.difficulty, card.stability, retrievability, rating);

        let stability = if rating == Rating::Hard {
            recall.min(self.next_forget_stability(
                card.difficulty,
                card.stability,
                retrievability,
            ))
        } else if elapsed_days == 0.0 {
            self.next_short_term_stability(card.stability, rating)
        } else {
            recall
        };

        MemoryState {
            stability,
            difficulty: self.next_difficulty(card.difficulty, rating),
        }
    }

    /// Largest whole-day interval at which recall probability still
    /// exceeds the target retention. 25-iteration binary search over
    /// [1, 3 * stability], floor of 1 day.
    pub fn solve_next_interval(&self, stability: f64) -> f64 {
        let mut low = 1.0;
        let mut high = (3.0 * stability).max(1.0);

        for _ in 0..25 {
            let mid = (low + high) / 2.0;
            if self.forgetting_curve(mid, stability) > self.target_retention {
                low = mid;
            } else {
                high = mid;
            }
        }

        high.round().max(1.0)
    }

    /// Online per-review nudge of every weight.
    ///
    /// `predicted` is the retrievability the model forecast for this
    /// review before it happened; the observed outcome is treated as a
    /// binary target (1 for Good/Easy, 0 otherwise). This is a crude
    /// gradient-free correction, not a batch optimizer.
    pub fn optimize(&mut self, predicted: f64, rating: Rating) {
        let target = if rating.is_correct() { 1.0 } else { 0.0 };
        let error = target - predicted;

        for w in self.weights.iter_mut() {
            *w += error * LEARNING_RATE;
        }
        self.weights = clamp_weights(self.weights);
        self.refresh();
    }
}
