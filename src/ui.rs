use crate::storage::DeckStats;
use chrono::{DateTime, Local, Utc};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// UI state for the study screen
pub struct StudyView<'a> {
    /// The deck name
    pub deck: &'a str,
    /// The prompt side of the card
    pub question: &'a str,
    /// Whether the answer is revealed
    pub showing_answer: bool,
    pub answer: &'a str,
    pub explanation: Option<&'a str>,
    /// Predicted recall probability at grading time, if the card has one
    pub recall: Option<f64>,
    /// Cards graded so far this session
    pub studied: usize,
}

/// Render the study screen
pub fn render_study(frame: &mut Frame, view: &StudyView) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),   // Top spacer
        Constraint::Length(1), // Deck name
        Constraint::Length(3), // Question
        Constraint::Length(1), // Spacer
        Constraint::Length(1), // Answer
        Constraint::Length(1), // Explanation
        Constraint::Length(1), // Predicted recall
        Constraint::Length(2), // Spacer
        Constraint::Length(1), // Key hints
        Constraint::Fill(1),   // Bottom spacer
    ])
    .split(area);

    let deck = Paragraph::new(format!("{} · {} studied", view.deck, view.studied))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(deck, chunks[1]);

    let question = Paragraph::new(view.question)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center);
    frame.render_widget(question, chunks[2]);

    if view.showing_answer {
        let answer = Paragraph::new(Line::from(vec![
            Span::styled("Answer: ", Style::default().fg(Color::DarkGray)),
            Span::styled(view.answer, Style::default().fg(Color::Green)),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(answer, chunks[4]);

        if let Some(explanation) = view.explanation {
            let explanation = Paragraph::new(explanation)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(explanation, chunks[5]);
        }

        if let Some(recall) = view.recall {
            let recall = Paragraph::new(format!("predicted recall {:.0}%", recall * 100.0))
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(recall, chunks[6]);
        }

        let hints = Paragraph::new("1 Again   2 Hard   3 Good   4 Easy")
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center);
        frame.render_widget(hints, chunks[8]);
    } else {
        let hints = Paragraph::new("Space to reveal · Esc to end session")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(hints, chunks[8]);
    }
}

/// Render deck selection screen
pub fn render_deck_selection(frame: &mut Frame, decks: &[DeckStats], selected: usize) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(2),
        Constraint::Length((decks.len() + 1) as u16),
        Constraint::Fill(1),
    ])
    .split(area);

    let title = Paragraph::new("Select a deck")
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[1]);

    let mut lines: Vec<Line> = Vec::new();

    if decks.is_empty() {
        lines.push(Line::from(Span::styled(
            "No decks found. Add .tsv files to the decks directory.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, deck) in decks.iter().enumerate() {
        let prefix = if i == selected { "> " } else { "  " };
        let style = if i == selected {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        };

        lines.push(Line::from(Span::styled(
            format!(
                "{}{} ({} due / {} total)",
                prefix, deck.name, deck.due_cards, deck.total_cards
            ),
            style,
        )));
    }

    let list = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(list, chunks[2]);
}

/// Render the waiting screen shown when nothing is due yet
pub fn render_waiting(frame: &mut Frame, until: DateTime<Utc>) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(4),
        Constraint::Fill(1),
    ])
    .split(area);

    let local = until.with_timezone(&Local);
    let lines = vec![
        Line::from(Span::styled(
            "Nothing due right now",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Next card at {}", local.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "Waiting… press Esc to end the session",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let waiting = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(waiting, chunks[1]);
}

/// Render session summary
pub fn render_summary(frame: &mut Frame, reviewed: usize, correct: usize, total_time_secs: i64) {
    let area = frame.area();

    let chunks = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(7),
        Constraint::Fill(1),
    ])
    .split(area);

    let accuracy = if reviewed > 0 {
        (correct as f64 / reviewed as f64) * 100.0
    } else {
        0.0
    };

    let lines = vec![
        Line::from(Span::styled(
            "Session Complete",
            Style::default().fg(Color::Green),
        )),
        Line::from(""),
        Line::from(format!("Cards reviewed: {}", reviewed)),
        Line::from(format!("Correct: {} ({:.0}%)", correct, accuracy)),
        Line::from(format!("Time: {}s", total_time_secs)),
        Line::from(""),
        Line::from(Span::styled(
            "Press q to quit or any other key to return to the decks",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let summary = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(summary, chunks[1]);
}
