use crate::card::{Deck, LearningState, RawCard, ReviewLogEntry};
use crate::deck::DeckFile;
use crate::fsrs::{DEFAULT_WEIGHTS, FsrsParams};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::path::Path;

/// Per-deck counts for the selection screen
#[derive(Debug, Clone)]
pub struct DeckStats {
    pub name: String,
    pub total_cards: i32,
    pub due_cards: i32,
}

/// Day-level aggregate written when a session ends
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub reviews: i64,
    pub correct: i64,
    pub time_secs: i64,
    pub decks_studied: i64,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        let storage = Storage { conn };
        storage.init_schema()?;

        Ok(storage)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let storage = Storage {
            conn: Connection::open_in_memory()?,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                deck TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                explanation TEXT,
                difficulty REAL,
                stability REAL,
                retrievability REAL,
                last_review TEXT,
                next_review TEXT,
                lapses INTEGER DEFAULT 0,
                state TEXT,
                short_term_reps INTEGER DEFAULT 0,
                history TEXT,
                created_at TEXT,
                updated_at TEXT,
                UNIQUE(deck, question)
            );

            CREATE TABLE IF NOT EXISTS params (
                user TEXT PRIMARY KEY,
                weights TEXT NOT NULL,
                retention REAL NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_stats (
                date TEXT PRIMARY KEY,
                reviews INTEGER NOT NULL DEFAULT 0,
                correct INTEGER NOT NULL DEFAULT 0,
                time_secs INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS daily_decks (
                date TEXT NOT NULL,
                deck TEXT NOT NULL,
                UNIQUE(date, deck)
            );

            CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck);
            CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(next_review);
            ",
        )?;

        Ok(())
    }

    /// Upsert card content from a deck file and delete cards whose
    /// question no longer appears in it
    pub fn sync_deck_content(&self, deck: &DeckFile, now: DateTime<Utc>) -> Result<()> {
        let now_str = now.to_rfc3339();
        let mut kept = HashSet::new();

        for entry in &deck.entries {
            kept.insert(entry.question.clone());
            self.conn.execute(
                "INSERT INTO cards (deck, question, answer, explanation, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(deck, question) DO UPDATE SET
                    answer = excluded.answer,
                    explanation = excluded.explanation",
                params![deck.name, entry.question, entry.answer, entry.explanation, now_str],
            )?;
        }

        let existing: Vec<(i64, String)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id, question FROM cards WHERE deck = ?1")?;
            let rows = stmt
                .query_map(params![deck.name], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for (id, question) in existing {
            if !kept.contains(&question) {
                self.conn
                    .execute("DELETE FROM cards WHERE id = ?1", params![id])?;
            }
        }

        Ok(())
    }

    /// Load all cards of a deck as raw, untrusted records.
    ///
    /// Corrupt numeric or JSON fields come back as None and are repaired
    /// by normalization; a broken row never fails the whole load.
    pub fn load_deck(&self, deck: &str) -> Result<Vec<RawCard>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, question, answer, explanation, difficulty, stability,
                    retrievability, last_review, next_review, lapses, state,
                    short_term_reps, history, created_at
             FROM cards WHERE deck = ?1 ORDER BY id",
        )?;

        let cards = stmt
            .query_map(params![deck], |row| {
                let history: Option<String> = row.get(12)?;
                let id: i64 = row.get(0)?;
                Ok(RawCard {
                    id,
                    question: row.get(1)?,
                    answer: row.get(2)?,
                    explanation: row.get(3)?,
                    difficulty: row.get(4)?,
                    stability: row.get(5)?,
                    retrievability: row.get(6)?,
                    last_review: parse_timestamp(row.get::<_, Option<String>>(7)?),
                    next_review: parse_timestamp(row.get::<_, Option<String>>(8)?),
                    lapses: row.get::<_, Option<i64>>(9)?.map(|n| n.max(0) as u32),
                    state: row
                        .get::<_, Option<String>>(10)?
                        .and_then(|s| LearningState::parse(&s)),
                    short_term_reps: row.get::<_, Option<i64>>(11)?.map(|n| n.max(0) as u32),
                    history: history.and_then(|json| parse_history(id, &json)),
                    created_at: parse_timestamp(row.get::<_, Option<String>>(13)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cards)
    }

    /// Write every card's scheduling state back
    pub fn save_deck(&self, deck: &Deck) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "UPDATE cards SET
                difficulty = ?1,
                stability = ?2,
                retrievability = ?3,
                last_review = ?4,
                next_review = ?5,
                lapses = ?6,
                state = ?7,
                short_term_reps = ?8,
                history = ?9,
                updated_at = ?10
             WHERE id = ?11",
        )?;

        for card in &deck.cards {
            stmt.execute(params![
                card.difficulty,
                card.stability,
                card.retrievability,
                card.last_review.map(|t| t.to_rfc3339()),
                card.next_review.map(|t| t.to_rfc3339()),
                card.lapses,
                card.state.as_str(),
                card.short_term_reps,
                serde_json::to_string(&card.history)?,
                card.updated_at.to_rfc3339(),
                card.id,
            ])?;
        }

        Ok(())
    }

    /// Load the user's global model weights, falling back to the
    /// published defaults when the row is missing or unreadable
    pub fn load_weights(&self, user: &str) -> Result<[f64; 21]> {
        let row: Option<String> = match self.conn.query_row(
            "SELECT weights FROM params WHERE user = ?1",
            params![user],
            |row| row.get(0),
        ) {
            Ok(json) => Some(json),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let Some(json) = row else {
            return Ok(DEFAULT_WEIGHTS);
        };

        match serde_json::from_str::<Vec<f64>>(&json) {
            Ok(values) => match <[f64; 21]>::try_from(values) {
                Ok(weights) => Ok(weights),
                Err(_) => {
                    warn!("stored weights for '{user}' have the wrong length, using defaults");
                    Ok(DEFAULT_WEIGHTS)
                }
            },
            Err(e) => {
                warn!("stored weights for '{user}' are unparseable ({e}), using defaults");
                Ok(DEFAULT_WEIGHTS)
            }
        }
    }

    /// Persist the user's global model parameters
    pub fn save_params(&self, user: &str, fsrs: &FsrsParams, now: DateTime<Utc>) -> Result<()> {
        let weights = serde_json::to_string(fsrs.weights().as_slice())?;
        self.conn.execute(
            "INSERT INTO params (user, weights, retention, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user) DO UPDATE SET
                weights = excluded.weights,
                retention = excluded.retention,
                updated_at = excluded.updated_at",
            params![user, weights, fsrs.target_retention(), now.to_rfc3339()],
        )?;

        Ok(())
    }

    /// Get all decks with card counts (a card with no next_review is due)
    pub fn deck_stats(&self, now: DateTime<Utc>) -> Result<Vec<DeckStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT deck, COUNT(*),
                    SUM(CASE WHEN next_review IS NULL OR next_review <= ?1 THEN 1 ELSE 0 END)
             FROM cards GROUP BY deck ORDER BY deck",
        )?;

        let stats = stmt
            .query_map(params![now.to_rfc3339()], |row| {
                Ok(DeckStats {
                    name: row.get(0)?,
                    total_cards: row.get(1)?,
                    due_cards: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    /// Accumulate a finished session into the day's aggregate row
    pub fn record_daily_stats(
        &self,
        date: NaiveDate,
        deck: &str,
        reviews: usize,
        correct: usize,
        time_secs: i64,
    ) -> Result<()> {
        let date_str = date.to_string();

        self.conn.execute(
            "INSERT INTO daily_stats (date, reviews, correct, time_secs)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
                reviews = reviews + excluded.reviews,
                correct = correct + excluded.correct,
                time_secs = time_secs + excluded.time_secs",
            params![date_str, reviews as i64, correct as i64, time_secs],
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO daily_decks (date, deck) VALUES (?1, ?2)",
            params![date_str, deck],
        )?;

        Ok(())
    }

    /// Day-level aggregate with the count of distinct decks studied
    pub fn daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        let date_str = date.to_string();

        let row = self.conn.query_row(
            "SELECT reviews, correct, time_secs,
                    (SELECT COUNT(*) FROM daily_decks WHERE date = ?1)
             FROM daily_stats WHERE date = ?1",
            params![date_str],
            |row| {
                Ok(DailySummary {
                    reviews: row.get(0)?,
                    correct: row.get(1)?,
                    time_secs: row.get(2)?,
                    decks_studied: row.get(3)?,
                })
            },
        );

        match row {
            Ok(summary) => Ok(Some(summary)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| s.parse().ok())
}

fn parse_history(card_id: i64, json: &str) -> Option<Vec<ReviewLogEntry>> {
    match serde_json::from_str(json) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("unreadable history for card {card_id} ({e}), resetting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rating;
    use crate::deck::CardContent;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn deck_file(questions: &[&str]) -> DeckFile {
        DeckFile {
            name: "geo".to_string(),
            entries: questions
                .iter()
                .map(|q| CardContent {
                    question: q.to_string(),
                    answer: format!("answer to {q}"),
                    explanation: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_sync_and_load() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .sync_deck_content(&deck_file(&["q1", "q2"]), t0())
            .unwrap();

        let cards = storage.load_deck("geo").unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].question, "q1");
        assert!(cards[0].difficulty.is_none());
    }

    #[test]
    fn test_sync_deletes_removed_cards() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .sync_deck_content(&deck_file(&["q1", "q2", "q3"]), t0())
            .unwrap();
        storage
            .sync_deck_content(&deck_file(&["q1", "q3"]), t0())
            .unwrap();

        let cards = storage.load_deck("geo").unwrap();
        let questions: Vec<_> = cards.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q3"]);
    }

    #[test]
    fn test_card_state_round_trip() {
        let storage = Storage::open_in_memory().unwrap();
        storage.sync_deck_content(&deck_file(&["q1"]), t0()).unwrap();

        let raw = storage.load_deck("geo").unwrap().remove(0);
        let mut card = raw.normalize(t0());
        card.difficulty = 6.4;
        card.stability = 12.25;
        card.retrievability = 1.0;
        card.last_review = Some(t0());
        card.next_review = Some(t0() + chrono::Duration::days(12));
        card.lapses = 3;
        card.state = LearningState::Review;
        card.short_term_reps = 0;
        card.history.push(ReviewLogEntry {
            at: t0(),
            rating: Rating::Good,
            time_spent_secs: 4.5,
            stability: 8.0,
            difficulty: 6.0,
        });

        storage
            .save_deck(&Deck {
                name: "geo".to_string(),
                cards: vec![card.clone()],
            })
            .unwrap();

        let reloaded = storage.load_deck("geo").unwrap().remove(0).normalize(t0());
        assert_eq!(reloaded, card);
    }

    #[test]
    fn test_load_weights_missing_row_uses_defaults() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.load_weights("default").unwrap(), DEFAULT_WEIGHTS);
    }

    #[test]
    fn test_params_round_trip() {
        let storage = Storage::open_in_memory().unwrap();
        let mut fsrs = FsrsParams::with_retention(0.85);
        fsrs.optimize(0.2, Rating::Good);

        storage.save_params("default", &fsrs, t0()).unwrap();
        let weights = storage.load_weights("default").unwrap();
        assert_eq!(&weights, fsrs.weights());
    }

    #[test]
    fn test_corrupt_weights_fall_back_to_defaults() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO params (user, weights, retention, updated_at)
                 VALUES ('default', 'not json', 0.9, '2026-03-01T08:00:00Z')",
                [],
            )
            .unwrap();
        assert_eq!(storage.load_weights("default").unwrap(), DEFAULT_WEIGHTS);

        storage
            .conn
            .execute(
                "UPDATE params SET weights = '[1.0, 2.0]' WHERE user = 'default'",
                [],
            )
            .unwrap();
        assert_eq!(storage.load_weights("default").unwrap(), DEFAULT_WEIGHTS);
    }

    #[test]
    fn test_daily_stats_accumulate() {
        let storage = Storage::open_in_memory().unwrap();
        let date = t0().date_naive();

        storage.record_daily_stats(date, "geo", 10, 8, 120).unwrap();
        storage.record_daily_stats(date, "math", 5, 5, 60).unwrap();
        storage.record_daily_stats(date, "geo", 2, 1, 30).unwrap();

        let summary = storage.daily_summary(date).unwrap().unwrap();
        assert_eq!(
            summary,
            DailySummary {
                reviews: 17,
                correct: 14,
                time_secs: 210,
                decks_studied: 2,
            }
        );
    }

    #[test]
    fn test_deck_stats_counts_due() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .sync_deck_content(&deck_file(&["q1", "q2"]), t0())
            .unwrap();

        let raw = storage.load_deck("geo").unwrap();
        let mut scheduled = raw[0].clone().normalize(t0());
        scheduled.state = LearningState::Review;
        scheduled.next_review = Some(t0() + chrono::Duration::days(3));
        storage
            .save_deck(&Deck {
                name: "geo".to_string(),
                cards: vec![scheduled],
            })
            .unwrap();

        let stats = storage.deck_stats(t0()).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_cards, 2);
        assert_eq!(stats[0].due_cards, 1);
    }
}
