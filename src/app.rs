use crate::card::Rating;
use crate::config::Config;
use crate::deck::{DeckFile, list_decks};
use crate::engine::{EngineConfig, NextCard, StudyEngine};
use crate::session::StudySession;
use crate::storage::{DeckStats, Storage};
use crate::ui;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use log::info;
use ratatui::{DefaultTerminal, Frame};
use std::time::Duration;

/// Application state phases
#[derive(Debug, Clone, PartialEq)]
enum Phase {
    DeckSelection,
    ShowingQuestion,
    ShowingAnswer,
    Waiting,
    Summary,
}

/// Main application state
pub struct App {
    config: Config,
    storage: Storage,
    phase: Phase,
    // Deck selection state
    available_decks: Vec<DeckStats>,
    selected_deck_idx: usize,
    // Study state
    session: Option<StudySession>,
    wait_until: Option<DateTime<Utc>>,
    // Summary state
    summary_time_secs: i64,
    // Exit flag
    should_exit: bool,
}

impl App {
    /// Create a new application
    pub fn new(config: Config) -> Result<Self> {
        config.ensure_dirs()?;
        let storage = Storage::open(&config.db_path)?;

        Ok(Self {
            config,
            storage,
            phase: Phase::DeckSelection,
            available_decks: Vec::new(),
            selected_deck_idx: 0,
            session: None,
            wait_until: None,
            summary_time_secs: 0,
            should_exit: false,
        })
    }

    /// Run the application
    pub fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        // Load deck info
        self.load_deck_info()?;

        // Main event loop
        while !self.should_exit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }

        // Flush day-level stats if the user quit mid-session
        if let Some(session) = &mut self.session {
            session.finish(&self.storage, Utc::now())?;
        }

        Ok(())
    }

    /// Sync deck files into the database and refresh deck stats
    fn load_deck_info(&mut self) -> Result<()> {
        let now = Utc::now();

        for path in list_decks(&self.config.decks_dir)? {
            let deck = DeckFile::load(&path)?;
            self.storage.sync_deck_content(&deck, now)?;
        }

        self.available_decks = self.storage.deck_stats(now)?;
        if self.selected_deck_idx >= self.available_decks.len() {
            self.selected_deck_idx = 0;
        }

        Ok(())
    }

    /// Start studying the selected deck
    fn start_studying(&mut self) -> Result<()> {
        let Some(deck) = self.available_decks.get(self.selected_deck_idx) else {
            return Ok(());
        };
        let deck_name = deck.name.clone();
        let now = Utc::now();

        let raw_cards = self.storage.load_deck(&deck_name)?;
        let weights = self.storage.load_weights(&self.config.user)?;
        let engine_config = EngineConfig {
            retention: self.config.retention,
            new_limit: self.config.new_limit,
        };

        let engine = StudyEngine::new(&deck_name, raw_cards, engine_config, weights, now);
        info!("starting session on deck '{deck_name}'");

        self.session = Some(StudySession::new(engine, &self.config.user, now));
        self.advance(now)?;

        Ok(())
    }

    /// Ask the session for the next card and move to the matching phase
    fn advance(&mut self, now: DateTime<Utc>) -> Result<()> {
        let Some(session) = &mut self.session else {
            return Ok(());
        };

        match session.advance(now) {
            NextCard::Due { .. } => {
                self.wait_until = None;
                self.phase = Phase::ShowingQuestion;
            }
            NextCard::Wait { until, .. } => {
                self.wait_until = Some(until);
                self.phase = Phase::Waiting;
            }
            NextCard::Finished => {
                self.end_session(now)?;
            }
        }

        Ok(())
    }

    /// Finalize the session and show the summary
    fn end_session(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(session) = &mut self.session {
            session.finish(&self.storage, now)?;
            self.summary_time_secs = session.elapsed_secs(now);
        }
        self.wait_until = None;
        self.phase = Phase::Summary;
        Ok(())
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        match self.phase {
            Phase::DeckSelection => {
                ui::render_deck_selection(frame, &self.available_decks, self.selected_deck_idx);
            }
            Phase::ShowingQuestion | Phase::ShowingAnswer => {
                let Some(session) = &self.session else {
                    return;
                };
                let Some(card) = session.current_card().and_then(|id| session.engine().card(id))
                else {
                    return;
                };

                let recall = (self.phase == Phase::ShowingAnswer && !card.is_unreviewed())
                    .then(|| session.engine().current_retrievability(card, Utc::now()));

                let view = ui::StudyView {
                    deck: session.engine().deck_name(),
                    question: &card.question,
                    showing_answer: self.phase == Phase::ShowingAnswer,
                    answer: &card.answer,
                    explanation: card.explanation.as_deref(),
                    recall,
                    studied: session.cards_studied(),
                };
                ui::render_study(frame, &view);
            }
            Phase::Waiting => {
                if let Some(until) = self.wait_until {
                    ui::render_waiting(frame, until);
                }
            }
            Phase::Summary => {
                let (reviewed, correct) = self
                    .session
                    .as_ref()
                    .map(|s| (s.cards_studied(), s.correct()))
                    .unwrap_or((0, 0));
                ui::render_summary(frame, reviewed, correct, self.summary_time_secs);
            }
        }
    }

    /// Handle input events
    fn handle_events(&mut self) -> Result<()> {
        // Poll with timeout so the waiting phase can re-check the clock
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events
                if key.kind != KeyEventKind::Press {
                    return Ok(());
                }

                match self.phase {
                    Phase::DeckSelection => self.handle_deck_selection(key)?,
                    Phase::ShowingQuestion => self.handle_showing_question(key)?,
                    Phase::ShowingAnswer => self.handle_showing_answer(key)?,
                    Phase::Waiting => self.handle_waiting(key)?,
                    Phase::Summary => self.handle_summary(key)?,
                }
            }
        } else if self.phase == Phase::Waiting
            && let Some(until) = self.wait_until
        {
            let now = Utc::now();
            if now >= until {
                self.advance(now)?;
            }
        }

        Ok(())
    }

    /// Handle deck selection input
    fn handle_deck_selection(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.selected_deck_idx > 0 {
                    self.selected_deck_idx -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_deck_idx + 1 < self.available_decks.len() {
                    self.selected_deck_idx += 1;
                }
            }
            KeyCode::Enter => {
                self.start_studying()?;
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                self.should_exit = true;
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle input while the question side is showing
    fn handle_showing_question(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.phase = Phase::ShowingAnswer;
            }
            KeyCode::Esc => {
                self.end_session(Utc::now())?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle input while the answer side is showing
    fn handle_showing_answer(&mut self, key: KeyEvent) -> Result<()> {
        let rating = match key.code {
            KeyCode::Char(c @ '1'..='4') => Rating::from_index(c as u8 - b'1'),
            KeyCode::Esc => {
                self.end_session(Utc::now())?;
                return Ok(());
            }
            _ => None,
        };

        if let Some(rating) = rating
            && let Some(session) = &mut self.session
        {
            let now = Utc::now();
            session.answer(&self.storage, rating, now)?;
            self.advance(now)?;
        }

        Ok(())
    }

    /// Handle input while waiting for the next card to come due
    fn handle_waiting(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('q') {
            self.end_session(Utc::now())?;
        }
        Ok(())
    }

    /// Handle summary input
    fn handle_summary(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('q') {
            self.should_exit = true;
        } else {
            self.session = None;
            self.phase = Phase::DeckSelection;
            self.load_deck_info()?;
        }
        Ok(())
    }
}
