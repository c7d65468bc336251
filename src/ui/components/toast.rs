use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::time::{Duration, Instant};

/// How long a toast stays on screen
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Error,
}

/// Transient notification in the bottom-right corner
#[derive(Debug, Clone)]
pub struct Toast {
  message: String,
  kind: ToastKind,
  shown_at: Instant,
}

impl Toast {
  pub fn success(message: impl Into<String>) -> Self {
    Self::new(message.into(), ToastKind::Success)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(message.into(), ToastKind::Error)
  }

  fn new(message: String, kind: ToastKind) -> Self {
    Self {
      message,
      kind,
      shown_at: Instant::now(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn kind(&self) -> ToastKind {
    self.kind
  }

  pub fn is_expired(&self) -> bool {
    self.shown_at.elapsed() >= TOAST_DURATION
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let color = match self.kind {
      ToastKind::Success => Color::Green,
      ToastKind::Error => Color::Red,
    };
    let width = (self.message.chars().count() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let toast_area = Rect::new(
      area.x + area.width.saturating_sub(width + 1),
      area.y + area.height.saturating_sub(height + 1),
      width,
      height,
    );

    frame.render_widget(Clear, toast_area);
    let paragraph = Paragraph::new(self.message.as_str())
      .style(Style::default().fg(color))
      .block(
        Block::default()
          .borders(Borders::ALL)
          .border_style(Style::default().fg(color)),
      );
    frame.render_widget(paragraph, toast_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fresh_toast_not_expired() {
    let toast = Toast::success("Customer updated successfully!");
    assert_eq!(toast.kind(), ToastKind::Success);
    assert!(!toast.is_expired());
  }

  #[test]
  fn test_toast_expires() {
    let mut toast = Toast::error("Failed to update customer");
    toast.shown_at = Instant::now() - TOAST_DURATION;
    assert!(toast.is_expired());
  }
}
