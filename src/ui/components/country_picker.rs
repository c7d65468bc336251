use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::api::Country;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Events emitted by the country picker that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryPickerEvent {
  /// Country chosen
  Selected(Country),
}

/// Searchable country list inside the edit modal
#[derive(Debug, Clone, Default)]
pub struct CountryPicker {
  search: TextInput,
  selected: usize,
}

impl CountryPicker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reset(&mut self) {
    self.search.clear();
    self.selected = 0;
  }

  /// Countries whose name contains the search text, case-insensitively
  pub fn visible<'a>(&self, countries: &'a [Country]) -> Vec<&'a Country> {
    let needle = self.search.value().trim().to_lowercase();
    countries
      .iter()
      .filter(|c| needle.is_empty() || c.name.to_lowercase().contains(&needle))
      .collect()
  }

  pub fn handle_key(&mut self, key: KeyEvent, countries: &[Country]) -> KeyResult<CountryPickerEvent> {
    let visible = self.visible(countries);
    match key.code {
      KeyCode::Down => {
        if !visible.is_empty() {
          self.selected = (self.selected + 1) % visible.len();
        }
        KeyResult::Handled
      }
      KeyCode::Up => {
        if !visible.is_empty() {
          self.selected = if self.selected == 0 {
            visible.len() - 1
          } else {
            self.selected - 1
          };
        }
        KeyResult::Handled
      }
      KeyCode::Enter => match visible.get(self.selected) {
        Some(country) => KeyResult::Event(CountryPickerEvent::Selected((*country).clone())),
        None => KeyResult::Handled,
      },
      KeyCode::Esc | KeyCode::Tab | KeyCode::BackTab => KeyResult::NotHandled,
      _ => match self.search.handle_key(key) {
        InputResult::Changed => {
          self.selected = 0;
          KeyResult::Handled
        }
        InputResult::Consumed => KeyResult::Handled,
        _ => KeyResult::NotHandled,
      },
    }
  }

  pub fn render(
    &self,
    frame: &mut Frame,
    area: Rect,
    countries: &[Country],
    loading: bool,
    current_id: &str,
    focused: bool,
  ) {
    let border = if focused { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border))
      .title(" Country ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height < 2 {
      return;
    }

    let [search_area, list_area] =
      Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(inner);

    let search_line = Line::from(vec![
      Span::styled("Search: ", Style::default().fg(Color::DarkGray)),
      Span::raw(self.search.value()),
      if focused {
        Span::styled("_", Style::default().fg(Color::Yellow))
      } else {
        Span::raw("")
      },
    ]);
    frame.render_widget(Paragraph::new(search_line), search_area);

    if loading && countries.is_empty() {
      let paragraph = Paragraph::new("Loading countries...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, list_area);
      return;
    }

    let visible = self.visible(countries);
    if visible.is_empty() {
      let paragraph = Paragraph::new("No countries found").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, list_area);
      return;
    }

    let items: Vec<ListItem> = visible
      .iter()
      .map(|country| {
        let style = if country.id == current_id {
          Style::default().fg(Color::Green).bold()
        } else {
          Style::default().fg(Color::Cyan)
        };
        ListItem::new(Line::from(Span::styled(country.name.as_str(), style)))
      })
      .collect();

    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    if focused {
      state.select(Some(self.selected.min(visible.len() - 1)));
    }
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}
