use crate::table::TableView;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the pagination footer under the table
pub fn draw_footer(frame: &mut Frame, area: Rect, view: &TableView, page_size: usize, total_records: usize) {
  let mut spans = vec![
    Span::raw(" "),
    Span::styled(
      format!("Page {} of {}", view.page_index + 1, view.page_count),
      Style::default().fg(Color::Cyan).bold(),
    ),
    Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
    Span::styled(format!("{} per page", page_size), Style::default().fg(Color::White)),
    Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
  ];

  let mut rows = if view.rows.is_empty() {
    "0 rows".to_string()
  } else {
    let first = view.offset(page_size) + 1;
    format!("{}-{} of {} rows", first, first + view.rows.len() - 1, view.total_rows)
  };
  if view.total_rows != total_records {
    rows.push_str(&format!(" (filtered from {})", total_records));
  }
  spans.push(Span::styled(rows, Style::default().fg(Color::White)));

  spans.push(Span::styled(
    "   h/l page · g/G first/last · +/- size",
    Style::default().fg(Color::DarkGray),
  ));

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
