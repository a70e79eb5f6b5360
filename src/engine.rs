use crate::card::{Card, Deck, LearningState, Rating, RawCard, ReviewLogEntry};
use crate::fsrs::FsrsParams;
use crate::queue::{DueQueue, NewQueue};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use std::collections::HashMap;

/// Engine tunables
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Target recall probability at the scheduled review time
    pub retention: f64,
    /// Maximum new cards introduced per engine instance (one session)
    pub new_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: 0.9,
            new_limit: 10,
        }
    }
}

/// Which queue a card was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    New,
    Learning,
    Review,
}

/// Outcome of asking for the next card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCard {
    /// A card is due now
    Due { card_id: i64, source: Source },
    /// Nothing due yet; re-check at `until`
    Wait { until: DateTime<Utc>, source: Source },
    /// Nothing due and nothing left to introduce
    Finished,
}

/// Upper bound on a solved review interval, in days (10 years)
const MAX_INTERVAL_DAYS: f64 = 3650.0;

/// Fixed short-interval steps for cards in the Learning state
fn learning_step(rating: Rating) -> Duration {
    match rating {
        Rating::Again => Duration::minutes(1),
        Rating::Hard => Duration::minutes(3),
        Rating::Good => Duration::minutes(10),
        Rating::Easy => Duration::minutes(30),
    }
}

/// Owns one deck's cards and decides what to study next.
///
/// Three internal queues: short-interval learning, long-interval review,
/// and a FIFO of never-seen cards. A card lives in at most one queue at
/// any instant; a card that was just drawn and not yet rated is in none.
/// The engine is synchronous and clock-free: every operation takes an
/// explicit `now`, and persistence is the caller's job.
pub struct StudyEngine {
    deck_name: String,
    cards: HashMap<i64, Card>,
    params: FsrsParams,
    new_limit: usize,
    introduced: usize,
    learning: DueQueue,
    review: DueQueue,
    fresh: NewQueue,
    params_dirty: bool,
}

impl StudyEngine {
    /// Normalize every raw card and route each into exactly one queue
    pub fn new(
        deck_name: impl Into<String>,
        raw_cards: Vec<RawCard>,
        config: EngineConfig,
        weights: [f64; 21],
        now: DateTime<Utc>,
    ) -> Self {
        let params = FsrsParams::new(weights, config.retention);

        let mut cards: Vec<Card> = raw_cards.into_iter().map(|raw| raw.normalize(now)).collect();
        cards.sort_by_key(|c| (c.created_at, c.id));

        let mut learning = DueQueue::new();
        let mut review = DueQueue::new();
        let mut fresh = NewQueue::new();
        let mut by_id = HashMap::with_capacity(cards.len());

        for card in cards {
            match card.state {
                LearningState::New => fresh.push_back(card.id),
                LearningState::Learning => learning.push(card.next_review.unwrap_or(now), card.id),
                LearningState::Review => review.push(card.next_review.unwrap_or(now), card.id),
            }
            by_id.insert(card.id, card);
        }

        Self {
            deck_name: deck_name.into(),
            cards: by_id,
            params,
            new_limit: config.new_limit,
            introduced: 0,
            learning,
            review,
            fresh,
            params_dirty: false,
        }
    }

    pub fn deck_name(&self) -> &str {
        &self.deck_name
    }

    pub fn card(&self, card_id: i64) -> Option<&Card> {
        self.cards.get(&card_id)
    }

    /// Snapshot of the deck for persistence
    pub fn deck(&self) -> Deck {
        let mut cards: Vec<Card> = self.cards.values().cloned().collect();
        cards.sort_by_key(|c| (c.created_at, c.id));
        Deck {
            name: self.deck_name.clone(),
            cards,
        }
    }

    pub fn params(&self) -> &FsrsParams {
        &self.params
    }

    /// True when `rate` nudged the global weights since the last
    /// `clear_params_dirty`
    pub fn params_dirty(&self) -> bool {
        self.params_dirty
    }

    pub fn clear_params_dirty(&mut self) {
        self.params_dirty = false;
    }

    /// Current recall probability of a card, recomputed from elapsed time
    pub fn current_retrievability(&self, card: &Card, now: DateTime<Utc>) -> f64 {
        match card.last_review {
            Some(last) => {
                let elapsed = elapsed_days(last, now);
                self.params.forgetting_curve(elapsed, card.stability)
            }
            None => 0.0,
        }
    }

    /// Pick the next card in fixed priority order: due learning head,
    /// due review head, then a new card while under the session limit.
    /// With nothing due, reports the earliest future due time, or
    /// `Finished` when the session is truly exhausted.
    pub fn next_card(&mut self, now: DateTime<Utc>) -> NextCard {
        if let Some((due, _)) = self.learning.peek()
            && due <= now
            && let Some((_, card_id)) = self.learning.shift()
        {
            return NextCard::Due {
                card_id,
                source: Source::Learning,
            };
        }

        if let Some((due, _)) = self.review.peek()
            && due <= now
            && let Some((_, card_id)) = self.review.shift()
        {
            return NextCard::Due {
                card_id,
                source: Source::Review,
            };
        }

        if self.introduced < self.new_limit
            && let Some(card_id) = self.fresh.pop_front()
        {
            if let Some(card) = self.cards.get_mut(&card_id) {
                card.state = LearningState::Learning;
                card.last_review = None;
                card.next_review = None;
                card.short_term_reps = 0;
                card.updated_at = now;
            }
            self.introduced += 1;
            return NextCard::Due {
                card_id,
                source: Source::New,
            };
        }

        let waits = [
            (self.learning.peek(), Source::Learning),
            (self.review.peek(), Source::Review),
        ];
        let earliest = waits
            .into_iter()
            .filter_map(|(entry, source)| entry.map(|(due, _)| (due, source)))
            .min_by_key(|(due, _)| *due);

        match earliest {
            Some((until, source)) => NextCard::Wait { until, source },
            None => NextCard::Finished,
        }
    }

    /// Apply a grade to a card: update its memory state, move it to the
    /// right queue, and record the review in its history. Unknown ids
    /// are a logged no-op (defends against double-submission).
    pub fn rate(
        &mut self,
        card_id: i64,
        rating: Rating,
        time_spent_secs: f64,
        now: DateTime<Utc>,
    ) -> Option<&Card> {
        let Some(mut card) = self.cards.remove(&card_id) else {
            warn!("rate: unknown card id {card_id}, ignoring");
            return None;
        };

        // Idempotent: the card is usually in no queue right after a draw
        self.learning.remove(card_id);
        self.review.remove(card_id);
        self.fresh.remove(card_id);

        let prev_stability = card.stability;
        let prev_difficulty = card.difficulty;

        match card.state {
            LearningState::New | LearningState::Learning => {
                card.state = LearningState::Learning;
                card.short_term_reps += 1;
                card.last_review = Some(now);
                if rating == Rating::Again {
                    card.lapses += 1;
                }

                if rating.is_correct() {
                    // Graduate: leave the learning steps the same day the
                    // card is first rated well
                    card.state = LearningState::Review;
                    card.short_term_reps = 0;
                    let due = now + Duration::hours(24);
                    card.next_review = Some(due);
                    self.review.push(due, card_id);
                } else {
                    let due = now + learning_step(rating);
                    card.next_review = Some(due);
                    self.learning.push(due, card_id);
                }
            }
            LearningState::Review => {
                let elapsed = card
                    .last_review
                    .map(|last| elapsed_days(last, now))
                    .unwrap_or(0.0);
                let predicted = self.params.forgetting_curve(elapsed, card.stability);

                let state = self.params.next_state(&card, elapsed, rating);
                card.stability = state.stability;
                card.difficulty = state.difficulty;
                // Display artifact only; scheduling recomputes from elapsed time
                card.retrievability = 1.0;
                card.state = LearningState::Review;
                card.short_term_reps = 0;
                card.last_review = Some(now);

                if rating == Rating::Again {
                    card.state = LearningState::Learning;
                    card.short_term_reps = 1;
                    card.lapses += 1;
                    let due = now + learning_step(Rating::Again);
                    card.next_review = Some(due);
                    self.learning.push(due, card_id);
                } else {
                    let days = self
                        .params
                        .solve_next_interval(card.stability)
                        .clamp(1.0, MAX_INTERVAL_DAYS);
                    let due = now + Duration::days(days as i64);
                    card.next_review = Some(due);
                    self.review.push(due, card_id);

                    self.params.optimize(predicted, rating);
                    self.params_dirty = true;
                }
            }
        }

        card.history.push(ReviewLogEntry {
            at: now,
            rating,
            time_spent_secs,
            stability: prev_stability,
            difficulty: prev_difficulty,
        });
        card.updated_at = now;

        self.cards.insert(card_id, card);
        self.cards.get(&card_id)
    }

    #[cfg(test)]
    fn queue_membership(&self, card_id: i64) -> usize {
        [
            self.learning.contains(card_id),
            self.review.contains(card_id),
            self.fresh.contains(card_id),
        ]
        .iter()
        .filter(|&&m| m)
        .count()
    }
}

/// Whole days between two instants, floored at zero
fn elapsed_days(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(last).num_days().max(0) as f64
}
