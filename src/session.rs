use crate::card::Rating;
use crate::engine::{NextCard, StudyEngine};
use crate::storage::Storage;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One study run over a single deck.
///
/// Thin controller around the engine: tracks session counters, remembers
/// when the current card was shown, and makes the persistence calls the
/// engine itself deliberately avoids. A wait signal from the engine is
/// passed through for the caller to schedule a deferred re-check; the
/// session never polls on its own.
pub struct StudySession {
    engine: StudyEngine,
    user: String,
    started_at: DateTime<Utc>,
    cards_studied: usize,
    correct: usize,
    total_time_secs: f64,
    current: Option<(i64, DateTime<Utc>)>,
    finalized: bool,
}

impl StudySession {
    pub fn new(engine: StudyEngine, user: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            engine,
            user: user.into(),
            started_at: now,
            cards_studied: 0,
            correct: 0,
            total_time_secs: 0.0,
            current: None,
            finalized: false,
        }
    }

    pub fn engine(&self) -> &StudyEngine {
        &self.engine
    }

    /// Card currently shown to the user, if any
    pub fn current_card(&self) -> Option<i64> {
        self.current.map(|(id, _)| id)
    }

    /// Ask the engine for the next card. `Due` marks the card as shown
    /// now; `Wait` and `Finished` pass straight through.
    pub fn advance(&mut self, now: DateTime<Utc>) -> NextCard {
        let next = self.engine.next_card(now);
        if let NextCard::Due { card_id, .. } = next {
            self.current = Some((card_id, now));
        }
        next
    }

    /// Grade the currently shown card, update counters, and persist the
    /// deck (and the nudged weights, when a review rating changed them).
    /// A no-op when no card is showing.
    pub fn answer(&mut self, storage: &Storage, rating: Rating, now: DateTime<Utc>) -> Result<()> {
        let Some((card_id, shown_at)) = self.current.take() else {
            return Ok(());
        };

        let time_spent_secs =
            (now.signed_duration_since(shown_at).num_milliseconds() as f64 / 1000.0).max(0.0);

        if self.engine.rate(card_id, rating, time_spent_secs, now).is_some() {
            self.cards_studied += 1;
            if rating.is_correct() {
                self.correct += 1;
            }
            self.total_time_secs += time_spent_secs;
        }

        storage.save_deck(&self.engine.deck())?;
        if self.engine.params_dirty() {
            storage.save_params(&self.user, self.engine.params(), now)?;
            self.engine.clear_params_dirty();
        }

        Ok(())
    }

    /// Persist the day-level aggregate; safe to call more than once
    pub fn finish(&mut self, storage: &Storage, now: DateTime<Utc>) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        storage.record_daily_stats(
            now.date_naive(),
            self.engine.deck_name(),
            self.cards_studied,
            self.correct,
            self.total_time_secs.round() as i64,
        )
    }

    pub fn cards_studied(&self) -> usize {
        self.cards_studied
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.started_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{CardContent, DeckFile};
    use crate::engine::EngineConfig;
    use crate::fsrs::DEFAULT_WEIGHTS;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn setup(questions: &[&str]) -> (Storage, StudySession) {
        let storage = Storage::open_in_memory().unwrap();
        let deck = DeckFile {
            name: "geo".to_string(),
            entries: questions
                .iter()
                .map(|q| CardContent {
                    question: q.to_string(),
                    answer: "a".to_string(),
                    explanation: None,
                })
                .collect(),
        };
        storage.sync_deck_content(&deck, t0()).unwrap();

        let raw = storage.load_deck("geo").unwrap();
        let engine = StudyEngine::new("geo", raw, EngineConfig::default(), DEFAULT_WEIGHTS, t0());
        let session = StudySession::new(engine, "default", t0());
        (storage, session)
    }

    #[test]
    fn test_answer_updates_counters_and_persists() {
        let (storage, mut session) = setup(&["q1"]);

        let NextCard::Due { card_id, .. } = session.advance(t0()) else {
            panic!("expected a due card");
        };
        session
            .answer(&storage, Rating::Good, t0() + Duration::seconds(5))
            .unwrap();

        assert_eq!(session.cards_studied(), 1);
        assert_eq!(session.correct(), 1);
        assert!(session.current_card().is_none());

        // The graded state reached storage
        let raw = storage.load_deck("geo").unwrap();
        let stored = raw.iter().find(|c| c.id == card_id).unwrap();
        assert_eq!(stored.state, Some(crate::card::LearningState::Review));
        assert_eq!(stored.history.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_incorrect_answer_not_counted_correct() {
        let (storage, mut session) = setup(&["q1"]);
        session.advance(t0());
        session
            .answer(&storage, Rating::Again, t0() + Duration::seconds(3))
            .unwrap();

        assert_eq!(session.cards_studied(), 1);
        assert_eq!(session.correct(), 0);
    }

    #[test]
    fn test_answer_without_card_is_noop() {
        let (storage, mut session) = setup(&["q1"]);
        session.answer(&storage, Rating::Good, t0()).unwrap();
        assert_eq!(session.cards_studied(), 0);
    }

    #[test]
    fn test_finish_records_daily_aggregate_once() {
        let (storage, mut session) = setup(&["q1", "q2"]);

        for _ in 0..2 {
            session.advance(t0());
            session
                .answer(&storage, Rating::Good, t0() + Duration::seconds(4))
                .unwrap();
        }
        session.finish(&storage, t0() + Duration::minutes(1)).unwrap();
        session.finish(&storage, t0() + Duration::minutes(2)).unwrap();

        let summary = storage.daily_summary(t0().date_naive()).unwrap().unwrap();
        assert_eq!(summary.reviews, 2);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.decks_studied, 1);
    }

    #[test]
    fn test_wait_signal_passes_through() {
        let (storage, mut session) = setup(&["q1"]);
        session.advance(t0());
        session.answer(&storage, Rating::Easy, t0()).unwrap();

        match session.advance(t0() + Duration::minutes(1)) {
            NextCard::Wait { until, .. } => {
                assert_eq!(until, t0() + Duration::hours(24));
            }
            other => panic!("expected wait, got {other:?}"),
        }
    }
}
