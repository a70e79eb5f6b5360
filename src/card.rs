use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fsrs::S_MIN;

/// How the user graded a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Forgot - card lapses back to short-interval steps
    Again = 0,
    /// Recalled with difficulty
    Hard = 1,
    /// Recalled normally
    Good = 2,
    /// Recalled effortlessly
    Easy = 3,
}

impl Rating {
    /// Grade index 0-3 (Again..Easy), used to select initial weights
    pub fn index(self) -> usize {
        self as usize
    }

    /// Grade as a real number for the memory model equations
    pub fn value(self) -> f64 {
        self as u8 as f64
    }

    /// Whether the answer counts as remembered
    pub fn is_correct(self) -> bool {
        self >= Rating::Good
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Rating::Again),
            1 => Some(Rating::Hard),
            2 => Some(Rating::Good),
            3 => Some(Rating::Easy),
            _ => None,
        }
    }
}

/// Scheduling state of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningState {
    /// Never drawn for study
    New,
    /// In short-interval steps (minutes)
    Learning,
    /// In long-interval FSRS scheduling (days)
    Review,
}

impl LearningState {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningState::New => "new",
            LearningState::Learning => "learning",
            LearningState::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LearningState::New),
            "learning" => Some(LearningState::Learning),
            "review" => Some(LearningState::Review),
            _ => None,
        }
    }
}

/// One graded review, recorded before the card state was updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub at: DateTime<Utc>,
    pub rating: Rating,
    pub time_spent_secs: f64,
    /// Stability before this review was applied
    pub stability: f64,
    /// Difficulty before this review was applied
    pub difficulty: f64,
}

/// A single reviewable card with its memory-model state
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub explanation: Option<String>,
    /// FSRS difficulty, always in [1, 10]
    pub difficulty: f64,
    /// FSRS stability in days, always >= S_MIN
    pub stability: f64,
    /// Last computed recall probability; advisory only
    pub retrievability: f64,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
    /// Count of Again outcomes, never decremented
    pub lapses: u32,
    pub state: LearningState,
    /// Consecutive short-interval reps since entering Learning
    pub short_term_reps: u32,
    /// Append-only audit trail
    pub history: Vec<ReviewLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// A card with no prior grading has no memory state yet
    pub fn is_unreviewed(&self) -> bool {
        self.last_review.is_none()
    }
}

/// A card as read back from storage, before any field is trusted.
///
/// Decks are hand-authored and have passed through several storage
/// layouts, so every scheduling field is optional here and repaired by
/// `normalize` rather than rejected.
#[derive(Debug, Clone, Default)]
pub struct RawCard {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub explanation: Option<String>,
    pub difficulty: Option<f64>,
    pub stability: Option<f64>,
    pub retrievability: Option<f64>,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
    pub lapses: Option<u32>,
    pub state: Option<LearningState>,
    pub short_term_reps: Option<u32>,
    pub history: Option<Vec<ReviewLogEntry>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawCard {
    /// Repair a stored card into a well-formed `Card`.
    ///
    /// Default-filling table:
    ///   difficulty       missing/NaN -> 5.0, else clamped to [1, 10]
    ///   stability        missing/NaN/<=0 -> S_MIN, else max(S_MIN)
    ///   retrievability   missing/NaN -> 0.0, else clamped to [0, 1]
    ///   lapses           missing -> 0
    ///   short_term_reps  missing -> 0
    ///   state            missing -> Review if next_review set, else New
    ///   history          missing -> empty
    ///   created_at       missing -> now
    pub fn normalize(self, now: DateTime<Utc>) -> Card {
        let difficulty = match self.difficulty {
            Some(d) if d.is_finite() => d.clamp(1.0, 10.0),
            _ => 5.0,
        };
        let stability = match self.stability {
            Some(s) if s.is_finite() && s > 0.0 => s.max(S_MIN),
            _ => S_MIN,
        };
        let retrievability = match self.retrievability {
            Some(r) if r.is_finite() => r.clamp(0.0, 1.0),
            _ => 0.0,
        };
        let state = self.state.unwrap_or(if self.next_review.is_some() {
            LearningState::Review
        } else {
            LearningState::New
        });

        Card {
            id: self.id,
            question: self.question,
            answer: self.answer,
            explanation: self.explanation,
            difficulty,
            stability,
            retrievability,
            last_review: self.last_review,
            next_review: self.next_review,
            lapses: self.lapses.unwrap_or(0),
            state,
            short_term_reps: self.short_term_reps.unwrap_or(0),
            history: self.history.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

/// A named collection of cards owned by one user
#[derive(Debug, Clone)]
pub struct Deck {
    pub name: String,
    pub cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let raw = RawCard {
            id: 1,
            question: "q".to_string(),
            answer: "a".to_string(),
            ..Default::default()
        };
        let card = raw.normalize(t0());

        assert_eq!(card.difficulty, 5.0);
        assert_eq!(card.stability, S_MIN);
        assert_eq!(card.retrievability, 0.0);
        assert_eq!(card.lapses, 0);
        assert_eq!(card.short_term_reps, 0);
        assert_eq!(card.state, LearningState::New);
        assert!(card.history.is_empty());
        assert_eq!(card.created_at, t0());
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        let raw = RawCard {
            id: 1,
            question: "q".to_string(),
            answer: "a".to_string(),
            difficulty: Some(42.0),
            stability: Some(-3.0),
            retrievability: Some(1.7),
            ..Default::default()
        };
        let card = raw.normalize(t0());

        assert_eq!(card.difficulty, 10.0);
        assert_eq!(card.stability, S_MIN);
        assert_eq!(card.retrievability, 1.0);
    }

    #[test]
    fn test_normalize_rejects_nan() {
        let raw = RawCard {
            id: 1,
            question: "q".to_string(),
            answer: "a".to_string(),
            difficulty: Some(f64::NAN),
            stability: Some(f64::NAN),
            retrievability: Some(f64::NAN),
            ..Default::default()
        };
        let card = raw.normalize(t0());

        assert_eq!(card.difficulty, 5.0);
        assert_eq!(card.stability, S_MIN);
        assert_eq!(card.retrievability, 0.0);
    }

    #[test]
    fn test_normalize_infers_state_from_next_review() {
        let raw = RawCard {
            id: 1,
            question: "q".to_string(),
            answer: "a".to_string(),
            next_review: Some(t0()),
            ..Default::default()
        };
        assert_eq!(raw.normalize(t0()).state, LearningState::Review);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = RawCard {
            id: 7,
            question: "q".to_string(),
            answer: "a".to_string(),
            explanation: Some("because".to_string()),
            difficulty: Some(6.2),
            stability: Some(14.5),
            retrievability: Some(0.8),
            last_review: Some(t0()),
            next_review: Some(t0() + chrono::Duration::days(14)),
            lapses: Some(2),
            state: Some(LearningState::Review),
            short_term_reps: Some(0),
            history: Some(vec![ReviewLogEntry {
                at: t0(),
                rating: Rating::Good,
                time_spent_secs: 4.0,
                stability: 7.0,
                difficulty: 6.0,
            }]),
            created_at: Some(t0() - chrono::Duration::days(30)),
        };
        let first = raw.normalize(t0());

        let again = RawCard {
            id: first.id,
            question: first.question.clone(),
            answer: first.answer.clone(),
            explanation: first.explanation.clone(),
            difficulty: Some(first.difficulty),
            stability: Some(first.stability),
            retrievability: Some(first.retrievability),
            last_review: first.last_review,
            next_review: first.next_review,
            lapses: Some(first.lapses),
            state: Some(first.state),
            short_term_reps: Some(first.short_term_reps),
            history: Some(first.history.clone()),
            created_at: Some(first.created_at),
        };
        let second = again.normalize(t0());

        assert_eq!(first, second);
    }

    #[test]
    fn test_rating_ordering() {
        assert!(Rating::Again < Rating::Hard);
        assert!(Rating::Hard < Rating::Good);
        assert!(Rating::Good < Rating::Easy);
        assert!(!Rating::Hard.is_correct());
        assert!(Rating::Good.is_correct());
    }

    #[test]
    fn test_rating_from_index() {
        assert_eq!(Rating::from_index(0), Some(Rating::Again));
        assert_eq!(Rating::from_index(3), Some(Rating::Easy));
        assert_eq!(Rating::from_index(4), None);
    }
}
