mod app;
mod card;
mod config;
mod deck;
mod engine;
mod fsrs;
mod queue;
mod session;
mod storage;
mod ui;

use anyhow::Result;
use app::App;
use config::Config;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load()?;
    let app = App::new(config)?;

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    result
}
