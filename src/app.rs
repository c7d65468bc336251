use crate::api::CachedApiClient;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui::renderfns::draw_header;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::RecordsView;
use color_eyre::Result;
use crossterm::event::KeyEvent;
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::info;

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  /// The records screen
  view: Box<dyn View>,

  /// Shared with the view; cleared on exit
  api: CachedApiClient,

  title: String,
  api_url: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let api = CachedApiClient::new(config)?;
    let view = RecordsView::new(api.clone(), config.table.page_size);

    Ok(Self {
      view: Box::new(view),
      title: config.title().to_string(),
      api_url: api.client().base_url().to_string(),
      api,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    info!(api = %self.api_url, "starting");

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    self.api.cache().clear();
    info!("stopped");
    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.view.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.view.handle_key(key) {
      ViewAction::Quit => self.should_quit = true,
      ViewAction::None => {}
    }
  }

  fn draw(&mut self, frame: &mut Frame) {
    let [header_area, body_area] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(frame.area());

    let badge = self.view.badge();
    draw_header(
      frame,
      header_area,
      &self.title,
      &self.api_url,
      badge.as_deref(),
      &self.view.shortcuts(),
    );
    self.view.render(frame, body_area);
  }
}
