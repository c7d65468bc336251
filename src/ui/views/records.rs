use crate::api::{CachedApiClient, Country, Record, RecordPatch};
use crate::cache::{CacheError, CacheEvent, QueryState};
use crate::form::{SAVE_FAILURE, SAVE_SUCCESS};
use crate::table::{self, Column, TableState, TableView};
use crate::task::Task;
use crate::ui::components::{
  ColumnFilter, EditEvent, EditModal, FilterEvent, KeyResult, SearchEvent, SearchInput, Toast,
};
use crate::ui::renderfns::{draw_footer, format_age, gender_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState as Selection};
use std::time::Instant;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Column used by the `f` filter overlay
const FILTER_COLUMN: Column = Column::Country;

/// The records table with search, filter, sort, pagination and editing
pub struct RecordsView {
  api: CachedApiClient,
  events: broadcast::Receiver<CacheEvent>,
  records: QueryState<Record>,
  countries: QueryState<Country>,
  table: TableState,
  selection: Selection,
  search: SearchInput,
  filter: ColumnFilter,
  editor: EditModal,
  records_load: Task<Result<usize, CacheError>>,
  countries_load: Task<Result<usize, CacheError>>,
  save: Task<Result<Record, CacheError>>,
  toast: Option<Toast>,
}

impl RecordsView {
  pub fn new(api: CachedApiClient, page_size: usize) -> Self {
    let events = api.cache().subscribe();
    let mut view = Self {
      api,
      events,
      records: QueryState::default(),
      countries: QueryState::default(),
      table: TableState::new(page_size),
      selection: Selection::default().with_selected(Some(0)),
      search: SearchInput::new(),
      filter: ColumnFilter::new(FILTER_COLUMN),
      editor: EditModal::new(),
      records_load: Task::idle(),
      countries_load: Task::idle(),
      save: Task::idle(),
      toast: None,
    };
    view.load_records();
    view
  }

  fn load_records(&mut self) {
    let api = self.api.clone();
    self.records_load = Task::spawn(async move { api.records().await.map(|r| r.data.len()) });
  }

  fn load_countries(&mut self) {
    if self.countries_load.is_running() {
      return;
    }
    let api = self.api.clone();
    self.countries_load = Task::spawn(async move { api.countries().await.map(|r| r.data.len()) });
  }

  fn refetch(&mut self) {
    info!("refetching records");
    if self.api.refetch_records().is_none() {
      self.load_records();
    }
  }

  /// Re-read cache state after it changed
  fn refresh(&mut self) {
    self.records = self.api.records_state();
    self.countries = self.api.countries_state();
    self.clamp_page();
  }

  fn clamp_page(&mut self) {
    let total = table::filter_rows(self.records.items(), &self.table).len();
    self.table.clamp_page(total);
  }

  fn derived(&self) -> TableView<'_> {
    table::derive(self.records.items(), &self.table)
  }

  fn selected_record(&self) -> Option<Record> {
    let index = self.selection.selected()?;
    self.derived().rows.get(index).map(|r| (*r).clone())
  }

  fn reset_selection(&mut self) {
    self.selection.select(Some(0));
  }

  fn move_selection(&mut self, down: bool) {
    let len = self.derived().rows.len();
    if len == 0 {
      return;
    }
    let current = self.selection.selected().unwrap_or(0).min(len - 1);
    let next = if down {
      (current + 1).min(len - 1)
    } else {
      current.saturating_sub(1)
    };
    self.selection.select(Some(next));
  }

  fn open_editor(&mut self) {
    let Some(record) = self.selected_record() else {
      return;
    };
    debug!(id = %record.id, "opening editor");
    self.editor.open(&record);
    self.load_countries();
  }

  fn start_save(&mut self, patch: RecordPatch) {
    let Some(id) = self.editor.form().record().map(|r| r.id.clone()) else {
      return;
    };
    info!(id = %id, "saving record");
    let api = self.api.clone();
    self.save = Task::spawn(async move { api.update_record(&id, patch).await });
  }

  fn on_saved(&mut self, result: Result<Record, CacheError>) {
    match result {
      Ok(record) => {
        info!(id = %record.id, "record saved");
        self.editor.finish::<CacheError>(Ok(()));
        self.toast = Some(Toast::success(SAVE_SUCCESS));
      }
      Err(e) => {
        warn!(error = %e, "record save failed");
        self.editor.finish(Err(&e));
        self.toast = Some(Toast::error(SAVE_FAILURE));
      }
    }
    self.refresh();
  }

  fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
    if self.editor.is_open() {
      let countries = self.countries.data.clone();
      let countries = countries.as_deref().map(Vec::as_slice).unwrap_or(&[]);
      if let KeyResult::Event(EditEvent::Submit(patch)) = self.editor.handle_key(key, countries) {
        self.start_save(patch);
      }
      return true;
    }

    if self.filter.is_active() {
      match self.filter.handle_key(key) {
        KeyResult::Event(FilterEvent::Toggle(column, value)) => {
          self.table.toggle_filter(column, &value);
          self.reset_selection();
        }
        KeyResult::Event(FilterEvent::Clear(column)) => {
          self.table.clear_filter(column);
          self.reset_selection();
        }
        _ => {}
      }
      return true;
    }

    let result = self.search.handle_key(key);
    if let KeyResult::Event(SearchEvent::Changed(query)) = &result {
      self.table.set_search(query);
      self.reset_selection();
    }
    result.is_consumed()
  }

  fn render_error(&self, frame: &mut Frame, area: Rect, error: &str) {
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));
    let lines = vec![
      Line::raw(""),
      Line::styled("Error Loading Data", Style::default().fg(Color::Red).bold()).centered(),
      Line::raw(""),
      Line::styled(error.to_string(), Style::default().fg(Color::White)).centered(),
      Line::raw(""),
      Line::styled("Press r to retry", Style::default().fg(Color::DarkGray)).centered(),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

fn table_title(table: &TableState, refreshing: bool, fetched_at: Option<Instant>) -> String {
  let mut title = String::from(" Customers ");
  if !table.search.is_empty() {
    title.push_str(&format!("[/{}] ", table.search));
  }
  if let Some(values) = table.filter_values(FILTER_COLUMN) {
    title.push_str(&format!("[{}: {}] ", FILTER_COLUMN.label(), values.len()));
  }
  if refreshing {
    title.push_str("(refreshing...) ");
  } else if let Some(fetched_at) = fetched_at {
    title.push_str(&format!("(updated {}) ", format_age(fetched_at.elapsed())));
  }
  title
}

fn header_row(table: &TableState) -> Row<'static> {
  let cells = Column::ALL.iter().enumerate().map(|(i, column)| {
    let indicator = table
      .sort_direction(*column)
      .map(|d| format!(" {}", d.indicator()))
      .unwrap_or_default();
    Cell::from(format!("{} {}{}", i + 1, column.label(), indicator))
  });
  Row::new(cells).style(Style::default().fg(Color::Yellow).bold())
}

fn record_row(record: &Record) -> Row<'static> {
  let gender = match Column::Gender.cell_text(record) {
    Some(text) => Cell::from(text).style(Style::default().fg(gender_color(record.is_male()))),
    None => Cell::from("-").style(Style::default().fg(Color::DarkGray)),
  };
  Row::new(vec![
    Cell::from(truncate(&Column::Name.display(record), 40)),
    gender,
    Cell::from(Column::RequestDate.display(record)),
    Cell::from(truncate(&Column::Country.display(record), 30)),
  ])
}

impl View for RecordsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.handle_overlay_key(key) {
      return ViewAction::None;
    }

    let total = table::filter_rows(self.records.items(), &self.table).len();
    match key.code {
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return ViewAction::Quit,
      KeyCode::Char('q') => return ViewAction::Quit,
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
      KeyCode::Char('h') | KeyCode::Left => {
        self.table.prev_page();
        self.reset_selection();
      }
      KeyCode::Char('l') | KeyCode::Right => {
        self.table.next_page(total);
        self.reset_selection();
      }
      KeyCode::Char('g') => {
        self.table.first_page();
        self.reset_selection();
      }
      KeyCode::Char('G') => {
        self.table.last_page(total);
        self.reset_selection();
      }
      KeyCode::Char(c @ '1'..='9') => {
        if let Some(column) = Column::from_shortcut(c) {
          self.table.toggle_sort(column);
          self.reset_selection();
        }
      }
      KeyCode::Char('f') => {
        self
          .filter
          .show(table::unique_values(FILTER_COLUMN, self.records.items()));
      }
      KeyCode::Char('+') | KeyCode::Char('=') => self.table.cycle_page_size(true),
      KeyCode::Char('-') => self.table.cycle_page_size(false),
      KeyCode::Char('e') | KeyCode::Enter => self.open_editor(),
      KeyCode::Char('r') => self.refetch(),
      KeyCode::Esc => {
        if !self.table.search.is_empty() {
          self.search.clear();
          self.table.set_search("");
          self.reset_selection();
        }
      }
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    if self.records.data.is_none() {
      if let Some(error) = self.records.error() {
        self.render_error(frame, area, &error.to_string());
      } else {
        let message = if self.records.is_initial_loading() {
          "Loading records..."
        } else {
          "Connecting..."
        };
        let paragraph = Paragraph::new(message)
          .style(Style::default().fg(Color::DarkGray))
          .block(Block::default().borders(Borders::ALL).title(" Customers "));
        frame.render_widget(paragraph, area);
      }
      if let Some(toast) = &self.toast {
        toast.render(frame, area);
      }
      return;
    }

    let [table_area, footer_area] =
      Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

    let view = table::derive(self.records.items(), &self.table);
    let block = Block::default()
      .title(table_title(
        &self.table,
        self.records.is_loading(),
        self.records.fetched_at,
      ))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if view.rows.is_empty() {
      let paragraph = Paragraph::new("No records found.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, table_area);
    } else {
      let selected = self.selection.selected().unwrap_or(0).min(view.rows.len() - 1);
      self.selection.select(Some(selected));

      let rows: Vec<Row> = view.rows.iter().map(|record| record_row(record)).collect();
      let widths = [
        Constraint::Fill(3),
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Fill(2),
      ];
      let table = Table::new(rows, widths)
        .header(header_row(&self.table))
        .block(block)
        .row_highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
      frame.render_stateful_widget(table, table_area, &mut self.selection);
    }

    draw_footer(
      frame,
      footer_area,
      &view,
      self.table.page_size,
      self.records.items().len(),
    );

    self.search.render_overlay(frame, table_area);
    self.filter.render_overlay(frame, table_area, &self.table);
    self.editor.render_overlay(
      frame,
      area,
      self.countries.items(),
      self.countries.is_loading() || self.countries_load.is_running(),
    );
    if let Some(toast) = &self.toast {
      toast.render(frame, area);
    }
  }

  fn badge(&self) -> Option<String> {
    self
      .records
      .data
      .as_ref()
      .map(|records| format!("{} Records", records.len()))
  }

  fn tick(&mut self) {
    let mut changed = false;
    loop {
      match self.events.try_recv() {
        Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }

    if let Some(result) = self.records_load.poll() {
      match result {
        Ok(count) => debug!(count, "records loaded"),
        Err(e) => warn!(error = %e, "records load failed"),
      }
      changed = true;
    }
    if let Some(result) = self.countries_load.poll() {
      if let Err(e) = result {
        warn!(error = %e, "countries load failed");
      }
      changed = true;
    }
    if changed {
      self.refresh();
    }

    if let Some(result) = self.save.poll() {
      self.on_saved(result);
    }

    if self.toast.as_ref().is_some_and(Toast::is_expired) {
      self.toast = None;
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.search.is_active() {
      return vec![
        ShortcutInfo::new("enter", "apply").with_priority(10),
        ShortcutInfo::new("esc", "clear").with_priority(20),
      ];
    }
    if self.editor.is_open() {
      return vec![
        ShortcutInfo::new("tab", "field").with_priority(10),
        ShortcutInfo::new("enter", "save").with_priority(20),
        ShortcutInfo::new("esc", "cancel").with_priority(30),
      ];
    }
    vec![
      ShortcutInfo::new("/", "search").with_priority(10),
      ShortcutInfo::new("f", "filter").with_priority(20),
      ShortcutInfo::new("1-4", "sort").with_priority(30),
      ShortcutInfo::new("e", "edit").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::cache::{QueryCache, RetryPolicy};
  use crate::config::{ApiConfig, Config};
  use crate::table::SortDirection;
  use crate::ui::components::ToastKind;
  use axum::extract::Path;
  use axum::http::StatusCode;
  use axum::routing::{get, put};
  use axum::{Json, Router};
  use serde_json::{json, Value};
  use std::time::Duration;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  async fn update(Path(id): Path<String>, Json(mut body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if id == "2" {
      return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    body["id"] = Value::String(id);
    Ok(Json(body))
  }

  async fn start_server() -> String {
    let app = Router::new()
      .route(
        "/taxes",
        get(|| async {
          Json(json!([
            { "id": "1", "name": "Acme", "gender": "male", "country": "US", "countryId": "1",
              "requestDate": "2024-01-05" },
            { "id": "2", "name": "Globex", "gender": "female", "country": "DE", "countryId": "2",
              "requestDate": null }
          ]))
        }),
      )
      .route("/taxes/:id", put(update))
      .route(
        "/countries",
        get(|| async { Json(json!([{ "id": "1", "name": "US" }, { "id": "2", "name": "DE" }])) }),
      );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
  }

  fn view(base_url: &str) -> RecordsView {
    let mut config = Config::default();
    config.api = ApiConfig {
      base_url: base_url.to_string(),
      ..ApiConfig::default()
    };
    let client = ApiClient::new(&config.api).unwrap();
    let api = CachedApiClient::with_cache(client, QueryCache::new(RetryPolicy::none()), &config);
    RecordsView::new(api, 5)
  }

  async fn tick_until(view: &mut RecordsView, cond: impl Fn(&RecordsView) -> bool) {
    for _ in 0..200 {
      view.tick();
      if cond(view) {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view never reached the expected state");
  }

  #[test]
  fn test_title_shows_search_filter_and_age() {
    let mut state = TableState::new(5);
    assert_eq!(table_title(&state, false, None), " Customers ");

    state.set_search("acme");
    state.toggle_filter(Column::Country, "US");
    assert_eq!(
      table_title(&state, false, Some(Instant::now())),
      " Customers [/acme] [Country: 1] (updated just now) "
    );
    assert_eq!(
      table_title(&state, true, Some(Instant::now())),
      " Customers [/acme] [Country: 1] (refreshing...) "
    );
  }

  #[tokio::test]
  async fn test_loads_records_into_badge() {
    let mut view = view(&start_server().await);
    tick_until(&mut view, |v| v.records.data.is_some()).await;
    assert_eq!(view.badge(), Some("2 Records".to_string()));
  }

  #[tokio::test]
  async fn test_unreachable_api_shows_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut view = view(&format!("http://{addr}"));
    tick_until(&mut view, |v| v.records.error().is_some()).await;
    assert!(view.records.data.is_none());
    assert_eq!(view.badge(), None);
  }

  #[tokio::test]
  async fn test_table_keys_update_state() {
    let mut view = view(&start_server().await);
    tick_until(&mut view, |v| v.records.data.is_some()).await;

    view.handle_key(key(KeyCode::Char('3')));
    assert_eq!(
      view.table.sort_direction(Column::RequestDate),
      Some(SortDirection::Ascending)
    );

    view.handle_key(key(KeyCode::Char('+')));
    assert_eq!(view.table.page_size, 10);

    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('g')));
    view.handle_key(key(KeyCode::Char('l')));
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.table.search, "gl");
    assert_eq!(view.derived().total_rows, 1);

    view.handle_key(key(KeyCode::Esc));
    assert_eq!(view.table.search, "");

    // reopening starts from an empty box
    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('x')));
    assert_eq!(view.table.search, "x");
    view.handle_key(key(KeyCode::Esc));
    assert_eq!(view.table.search, "");

    view.handle_key(key(KeyCode::Char('f')));
    view.handle_key(key(KeyCode::Char(' ')));
    view.handle_key(key(KeyCode::Esc));
    assert_eq!(view.derived().rows[0].name, "Globex");
    assert_eq!(view.derived().total_rows, 1);

    assert_eq!(view.handle_key(key(KeyCode::Char('q'))), ViewAction::Quit);
  }

  #[tokio::test]
  async fn test_edit_and_save_shows_success_toast() {
    let mut view = view(&start_server().await);
    tick_until(&mut view, |v| v.records.data.is_some()).await;

    view.handle_key(key(KeyCode::Char('e')));
    assert!(view.editor.is_open());
    for c in " Corp".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));
    assert!(view.editor.form().is_submitting());

    tick_until(&mut view, |v| v.toast.is_some()).await;
    let toast = view.toast.as_ref().unwrap();
    assert_eq!(toast.kind(), ToastKind::Success);
    assert_eq!(toast.message(), SAVE_SUCCESS);
    assert!(!view.editor.is_open());
  }

  #[tokio::test]
  async fn test_failed_save_reverts_and_keeps_form_open() {
    let mut view = view(&start_server().await);
    tick_until(&mut view, |v| v.records.data.is_some()).await;

    view.handle_key(key(KeyCode::Char('j')));
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.editor.form().fields().name, "Globex");
    for c in " Inc".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    view.handle_key(key(KeyCode::Enter));

    tick_until(&mut view, |v| v.toast.is_some()).await;
    assert_eq!(view.toast.as_ref().unwrap().message(), SAVE_FAILURE);
    assert!(view.editor.is_open());
    assert!(view.editor.form().submit_error().is_some());
    assert_eq!(view.records.items()[1].name, "Globex");
  }
}
