use super::KeyResult;
use crate::table::{Column, TableState};
use crate::ui::centered_rect;
use crate::ui::renderfns::truncate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// Events emitted by the filter overlay that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
  /// Flip one value in or out of the selection
  Toggle(Column, String),
  /// Drop every selected value of the column
  Clear(Column),
}

/// Multi-select overlay for filtering a column by its distinct values
#[derive(Debug, Clone)]
pub struct ColumnFilter {
  active: bool,
  column: Column,
  options: Vec<String>,
  cursor: usize,
}

impl Default for ColumnFilter {
  fn default() -> Self {
    Self::new(Column::Country)
  }
}

impl ColumnFilter {
  pub fn new(column: Column) -> Self {
    Self {
      active: false,
      column,
      options: Vec::new(),
      cursor: 0,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open with the distinct values currently present
  pub fn show(&mut self, options: Vec<String>) {
    self.active = true;
    self.options = options;
    self.cursor = self.cursor.min(self.options.len().saturating_sub(1));
  }

  pub fn hide(&mut self) {
    self.active = false;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FilterEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Enter | KeyCode::Char('f') | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Handled
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.options.is_empty() {
          self.cursor = (self.cursor + 1) % self.options.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.options.is_empty() {
          self.cursor = if self.cursor == 0 {
            self.options.len() - 1
          } else {
            self.cursor - 1
          };
        }
        KeyResult::Handled
      }
      KeyCode::Char(' ') => match self.options.get(self.cursor) {
        Some(value) => KeyResult::Event(FilterEvent::Toggle(self.column, value.clone())),
        None => KeyResult::Handled,
      },
      KeyCode::Char('c') => KeyResult::Event(FilterEvent::Clear(self.column)),
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, table: &TableState) {
    if !self.active {
      return;
    }

    let longest = self.options.iter().map(|o| o.chars().count()).max().unwrap_or(10);
    let width = (longest as u16 + 10).clamp(24, area.width.saturating_sub(4).max(24));
    let height = (self.options.len() as u16 + 3).clamp(4, area.height.saturating_sub(2).max(4));
    let overlay_area = centered_rect(area, width, height);

    frame.render_widget(Clear, overlay_area);

    let selected = table.filter_values(self.column).map_or(0, |v| v.len());
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" Filter {} ({} selected) ", self.column.label(), selected))
      .title_bottom(Line::from(" space toggle · c clear · esc close ").centered());

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if self.options.is_empty() {
      frame.render_widget(
        Line::styled("No values", Style::default().fg(Color::DarkGray)),
        inner,
      );
      return;
    }

    let max_len = inner.width.saturating_sub(5) as usize;
    let items: Vec<ListItem> = self
      .options
      .iter()
      .map(|value| {
        let checked = table.is_selected(self.column, value);
        let (mark, style) = if checked {
          ("[x] ", Style::default().fg(Color::Green))
        } else {
          ("[ ] ", Style::default().fg(Color::White))
        };
        ListItem::new(Line::from(vec![
          Span::styled(mark, style),
          Span::styled(truncate(value, max_len), style),
        ]))
      })
      .collect();

    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default();
    state.select(Some(self.cursor));
    frame.render_stateful_widget(list, inner, &mut state);
  }
}
