use std::cmp::Ordering;

use crate::api::Record;

/// Columns of the records table, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
  Name,
  Gender,
  RequestDate,
  Country,
}

impl Column {
  pub const ALL: [Column; 4] = [
    Column::Name,
    Column::Gender,
    Column::RequestDate,
    Column::Country,
  ];

  /// Header label
  pub fn label(&self) -> &'static str {
    match self {
      Column::Name => "Entity",
      Column::Gender => "Gender",
      Column::RequestDate => "Request Date",
      Column::Country => "Country",
    }
  }

  /// Column for a 1-based shortcut digit
  pub fn from_shortcut(digit: char) -> Option<Column> {
    let index = digit.to_digit(10)?.checked_sub(1)?;
    Column::ALL.get(index as usize).copied()
  }

  /// Cell text as shown in the table; `None` when the record has no value.
  ///
  /// Search and multi-select filters both match against this text.
  pub fn cell_text(&self, record: &Record) -> Option<String> {
    let text = match self {
      Column::Name => record.name.trim().to_string(),
      Column::Gender if record.gender.trim().is_empty() => String::new(),
      Column::Gender => record.display_gender(),
      Column::RequestDate => return record.request_date.map(|_| record.display_request_date()),
      Column::Country => record.country.trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
  }

  /// Cell text with "-" standing in for missing values
  pub fn display(&self, record: &Record) -> String {
    self.cell_text(record).unwrap_or_else(|| "-".to_string())
  }

  /// Ascending order of two records by this column.
  ///
  /// Text compares case-insensitively. A missing request date is greater
  /// than every present one, so it lands last ascending and first descending.
  pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
    match self {
      Column::Name => cmp_text(&a.name, &b.name),
      Column::Gender => cmp_text(&a.gender, &b.gender),
      Column::Country => cmp_text(&a.country, &b.country),
      Column::RequestDate => match (a.request_date, b.request_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
      },
    }
  }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
  a.to_lowercase().cmp(&b.to_lowercase())
}
