use super::country_picker::{CountryPicker, CountryPickerEvent};
use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::api::{Country, Record, RecordPatch};
use crate::form::{EditForm, FormPhase};
use crate::ui::centered_rect;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the edit modal that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
  /// Validated patch ready to be written
  Submit(RecordPatch),
  /// Modal dismissed without saving
  Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Focus {
  #[default]
  Name,
  Country,
}

/// Modal for editing a record's name and country
#[derive(Debug, Clone, Default)]
pub struct EditModal {
  form: EditForm,
  name: TextInput,
  picker: CountryPicker,
  focus: Focus,
}

impl EditModal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_open(&self) -> bool {
    self.form.is_open()
  }

  pub fn form(&self) -> &EditForm {
    &self.form
  }

  pub fn open(&mut self, record: &Record) {
    self.form.open(record);
    self.name = TextInput::with_value(&record.name);
    self.picker.reset();
    self.focus = Focus::Name;
  }

  /// Report the outcome of the write started by `EditEvent::Submit`
  pub fn finish<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
    self.form.finish(result);
  }

  pub fn handle_key(&mut self, key: KeyEvent, countries: &[Country]) -> KeyResult<EditEvent> {
    match self.form.phase() {
      FormPhase::Closed => return KeyResult::NotHandled,
      FormPhase::Submitting => return KeyResult::Handled,
      FormPhase::Open => {}
    }

    match key.code {
      KeyCode::Esc => {
        self.form.close();
        return KeyResult::Event(EditEvent::Closed);
      }
      KeyCode::Tab | KeyCode::BackTab => {
        self.focus = match self.focus {
          Focus::Name => Focus::Country,
          Focus::Country => Focus::Name,
        };
        return KeyResult::Handled;
      }
      KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => return self.submit(),
      _ => {}
    }

    match self.focus {
      Focus::Name => match self.name.handle_key(key) {
        InputResult::Submitted(_) => self.submit(),
        InputResult::Changed => {
          self.form.set_name(self.name.value());
          KeyResult::Handled
        }
        _ => KeyResult::Handled,
      },
      Focus::Country => {
        if let KeyResult::Event(CountryPickerEvent::Selected(country)) = self.picker.handle_key(key, countries) {
          self.form.select_country(&country);
          self.focus = Focus::Name;
        }
        KeyResult::Handled
      }
    }
  }

  fn submit(&mut self) -> KeyResult<EditEvent> {
    match self.form.submit() {
      Some(Ok(patch)) => KeyResult::Event(EditEvent::Submit(patch)),
      Some(Err(_)) => {
        self.focus = Focus::Name;
        KeyResult::Handled
      }
      None => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, countries: &[Country], countries_loading: bool) {
    if !self.form.is_open() {
      return;
    }

    let overlay_area = centered_rect(area, 64, 22);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Cyan))
      .title(" Edit Customer ")
      .title_bottom(Line::from(" tab switch field · enter save · esc cancel ").centered());
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let [name_area, error_area, current_area, picker_area, status_area] = Layout::vertical([
      Constraint::Length(3),
      Constraint::Length(1),
      Constraint::Length(1),
      Constraint::Min(4),
      Constraint::Length(1),
    ])
    .areas(inner);

    self.render_name(frame, name_area);

    if let Some(error) = self.form.name_error() {
      frame.render_widget(
        Line::styled(format!(" {}", error), Style::default().fg(Color::Red)),
        error_area,
      );
    }

    let fields = self.form.fields();
    let current = if fields.country.is_empty() {
      "-"
    } else {
      fields.country.as_str()
    };
    frame.render_widget(
      Line::from(vec![
        Span::styled(" Selected: ", Style::default().fg(Color::DarkGray)),
        Span::styled(current, Style::default().fg(Color::White).bold()),
      ]),
      current_area,
    );

    self.picker.render(
      frame,
      picker_area,
      countries,
      countries_loading,
      &fields.country_id,
      self.focus == Focus::Country && !self.form.is_submitting(),
    );

    let status = if self.form.is_submitting() {
      Some(Line::styled(" Saving...", Style::default().fg(Color::Yellow)))
    } else {
      self
        .form
        .submit_error()
        .map(|e| Line::styled(format!(" {}", e), Style::default().fg(Color::Red)))
    };
    if let Some(line) = status {
      frame.render_widget(line, status_area);
    }
  }

  fn render_name(&self, frame: &mut Frame, area: Rect) {
    let focused = self.focus == Focus::Name && !self.form.is_submitting();
    let border = if self.form.name_error().is_some() {
      Color::Red
    } else if focused {
      Color::Yellow
    } else {
      Color::DarkGray
    };

    let (before, after) = self.name.split_at_cursor();
    let mut spans = vec![Span::raw(before)];
    if focused {
      spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::raw(after));

    let paragraph = Paragraph::new(Line::from(spans)).block(
      Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(" Name "),
    );
    frame.render_widget(paragraph, area);
  }
}
