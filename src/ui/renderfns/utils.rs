use ratatui::prelude::Color;
use std::time::Duration;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Badge color for a gender cell
pub fn gender_color(is_male: bool) -> Color {
  if is_male {
    Color::Blue
  } else {
    Color::Magenta
  }
}

/// Compact "time since" label, e.g. "just now", "42s ago", "3m ago"
pub fn format_age(age: Duration) -> String {
  let secs = age.as_secs();
  match secs {
    0..=4 => "just now".to_string(),
    5..=59 => format!("{}s ago", secs),
    60..=3599 => format!("{}m ago", secs / 60),
    _ => format!("{}h ago", secs / 3600),
  }
}
