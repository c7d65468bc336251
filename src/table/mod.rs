//! Client-side table derivation: filter, search, sort and paginate.
//!
//! Everything here is pure. `derive` takes the cached records and the
//! current `TableState` and returns the rows of the visible page without
//! touching the source slice.

mod column;
mod state;

use std::collections::BTreeSet;

pub use column::Column;
pub use state::{SortDirection, SortKey, TableState};

use crate::api::Record;

/// One page of derived rows
#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a> {
  pub rows: Vec<&'a Record>,
  /// Effective page, already clamped
  pub page_index: usize,
  pub page_count: usize,
  /// Rows after filtering and search, across all pages
  pub total_rows: usize,
}

impl TableView<'_> {
  /// Absolute index of the first row on this page
  pub fn offset(&self, page_size: usize) -> usize {
    self.page_index * page_size
  }
}

pub fn derive<'a>(records: &'a [Record], state: &TableState) -> TableView<'a> {
  let mut rows = filter_rows(records, state);
  sort_rows(&mut rows, &state.sort);

  let total_rows = rows.len();
  let page_count = state.page_count(total_rows);
  let page_index = state.page_index.min(page_count - 1);
  let rows = rows
    .into_iter()
    .skip(page_index * state.page_size)
    .take(state.page_size)
    .collect();

  TableView {
    rows,
    page_index,
    page_count,
    total_rows,
  }
}

/// Rows passing every column filter and the search text, in source order
pub fn filter_rows<'a>(records: &'a [Record], state: &TableState) -> Vec<&'a Record> {
  let needle = state.search.to_lowercase();
  records
    .iter()
    .filter(|record| passes_filters(record, state))
    .filter(|record| needle.is_empty() || matches_search(record, &needle))
    .collect()
}

fn passes_filters(record: &Record, state: &TableState) -> bool {
  state.filters.keys().all(|&column| match state.filter_values(column) {
    None => true,
    Some(values) => column
      .cell_text(record)
      .is_some_and(|text| values.contains(&text)),
  })
}

/// Does any column's text contain `needle` (already lowercased)?
pub fn matches_search(record: &Record, needle: &str) -> bool {
  Column::ALL.iter().any(|column| {
    column
      .cell_text(record)
      .is_some_and(|text| text.to_lowercase().contains(needle))
  })
}

/// Stable multi-key sort
pub fn sort_rows(rows: &mut [&Record], sort: &[SortKey]) {
  if sort.is_empty() {
    return;
  }
  rows.sort_by(|a, b| {
    sort
      .iter()
      .map(|key| {
        let ordering = key.column.compare(a, b);
        match key.direction {
          SortDirection::Ascending => ordering,
          SortDirection::Descending => ordering.reverse(),
        }
      })
      .find(|ordering| ordering.is_ne())
      .unwrap_or(std::cmp::Ordering::Equal)
  });
}

/// Sorted distinct values of `column`, for filter options
pub fn unique_values(column: Column, records: &[Record]) -> Vec<String> {
  records
    .iter()
    .filter_map(|record| column.cell_text(record))
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(id: usize, name: &str, country: &str, date: Option<&str>) -> Record {
    serde_json::from_value(json!({
      "id": id.to_string(),
      "name": name,
      "gender": if id % 2 == 0 { "female" } else { "male" },
      "country": country,
      "countryId": country,
      "requestDate": date,
    }))
    .unwrap()
  }

  fn names(view: &TableView) -> Vec<String> {
    view.rows.iter().map(|r| r.name.clone()).collect()
  }

  fn sample() -> Vec<Record> {
    vec![
      record(1, "Acme", "US", Some("2024-03-01")),
      record(2, "globex", "DE", None),
      record(3, "Initech", "US", Some("2024-01-15")),
      record(4, "Umbrella", "FR", Some("2024-02-10")),
      record(5, "", "DE", None),
    ]
  }

  fn sorted(column: Column, direction: SortDirection) -> TableState {
    let mut state = TableState::new(50);
    state.sort = vec![SortKey { column, direction }];
    state
  }

  #[test]
  fn test_missing_dates_sort_last_ascending_first_descending() {
    let records = sample();

    let asc = derive(&records, &sorted(Column::RequestDate, SortDirection::Ascending));
    assert_eq!(names(&asc), vec!["Initech", "Umbrella", "Acme", "globex", ""]);

    let desc = derive(&records, &sorted(Column::RequestDate, SortDirection::Descending));
    assert_eq!(names(&desc), vec!["globex", "", "Acme", "Umbrella", "Initech"]);
  }

  #[test]
  fn test_text_sort_is_case_insensitive_and_stable() {
    let records = sample();
    let view = derive(&records, &sorted(Column::Name, SortDirection::Ascending));
    assert_eq!(names(&view), vec!["", "Acme", "globex", "Initech", "Umbrella"]);

    // ties on country keep source order
    let view = derive(&records, &sorted(Column::Country, SortDirection::Ascending));
    assert_eq!(names(&view), vec!["globex", "", "Umbrella", "Acme", "Initech"]);
  }

  #[test]
  fn test_multi_key_sort() {
    let records = sample();
    let mut state = TableState::new(50);
    state.sort = vec![
      SortKey {
        column: Column::Country,
        direction: SortDirection::Descending,
      },
      SortKey {
        column: Column::Name,
        direction: SortDirection::Descending,
      },
    ];
    let view = derive(&records, &state);
    assert_eq!(names(&view), vec!["Initech", "Acme", "Umbrella", "globex", ""]);
  }

  #[test]
  fn test_derive_leaves_source_untouched() {
    let records = sample();
    let before = records.clone();
    derive(&records, &sorted(Column::Name, SortDirection::Descending));
    assert_eq!(records, before);
  }

  #[test]
  fn test_empty_filter_selection_passes_everything() {
    let records = sample();
    let mut state = TableState::new(50);
    state.filters.insert(Column::Country, BTreeSet::new());
    assert_eq!(derive(&records, &state).total_rows, 5);
  }

  #[test]
  fn test_filter_selection_keeps_exact_subset() {
    let records = sample();
    let mut state = TableState::new(50);
    state.toggle_filter(Column::Country, "US");
    state.toggle_filter(Column::Country, "FR");
    let view = derive(&records, &state);
    assert_eq!(names(&view), vec!["Acme", "Initech", "Umbrella"]);

    state.toggle_filter(Column::Country, "FR");
    assert_eq!(names(&derive(&records, &state)), vec!["Acme", "Initech"]);

    state.toggle_filter(Column::Country, "US");
    assert!(state.filters.is_empty());
    assert_eq!(derive(&records, &state).total_rows, 5);
  }

  #[test]
  fn test_search() {
    let records = sample();
    let mut state = TableState::new(50);

    state.set_search("");
    assert_eq!(derive(&records, &state).total_rows, 5);

    state.set_search("ACM");
    assert_eq!(names(&derive(&records, &state)), vec!["Acme"]);

    // matches any column's display text
    state.set_search("female");
    assert_eq!(names(&derive(&records, &state)), vec!["globex", "Umbrella"]);

    state.set_search("feb 10");
    assert_eq!(names(&derive(&records, &state)), vec!["Umbrella"]);

    state.set_search("zzz");
    assert_eq!(derive(&records, &state).total_rows, 0);
  }

  #[test]
  fn test_search_keeps_surrounding_spaces() {
    let records = vec![
      record(1, "Acme Corp", "US", None),
      record(2, "Corporate Ltd", "US", None),
    ];
    let mut state = TableState::new(50);

    state.set_search(" corp");
    assert_eq!(names(&derive(&records, &state)), vec!["Acme Corp"]);

    state.set_search("corp ");
    assert_eq!(names(&derive(&records, &state)), Vec::<&str>::new());

    state.set_search("   ");
    assert_eq!(derive(&records, &state).total_rows, 0);
  }

  #[test]
  fn test_empty_cells_never_match_search() {
    let records = vec![record(1, "", "", None)];
    let mut state = TableState::new(50);
    state.set_search("-");
    assert_eq!(derive(&records, &state).total_rows, 0);
  }

  #[test]
  fn test_twelve_rows_paginate_five_five_two() {
    let records: Vec<Record> = (1..=12)
      .map(|i| record(i, &format!("r{i:02}"), "US", None))
      .collect();
    let mut state = TableState::new(5);

    let sizes: Vec<usize> = (0..3)
      .map(|page| {
        state.page_index = page;
        let view = derive(&records, &state);
        assert_eq!(view.page_count, 3);
        view.rows.len()
      })
      .collect();
    assert_eq!(sizes, vec![5, 5, 2]);

    state.page_index = 2;
    assert_eq!(names(&derive(&records, &state)), vec!["r11", "r12"]);
  }

  #[test]
  fn test_shrinking_rows_clamps_page() {
    let records: Vec<Record> = (1..=12)
      .map(|i| record(i, &format!("r{i:02}"), "US", None))
      .collect();
    let mut state = TableState::new(5);
    state.page_index = 2;

    let shrunk = &records[..3];
    let view = derive(shrunk, &state);
    assert_eq!(view.page_index, 0);
    assert_eq!(view.page_count, 1);
    assert_eq!(view.rows.len(), 3);

    state.clamp_page(shrunk.len());
    assert_eq!(state.page_index, 0);
  }

  #[test]
  fn test_no_rows_still_one_page() {
    let state = TableState::new(5);
    let view = derive(&[], &state);
    assert_eq!(view.page_count, 1);
    assert_eq!(view.page_index, 0);
    assert!(view.rows.is_empty());
  }

  #[test]
  fn test_toggle_sort_cycles() {
    let mut state = TableState::default();
    state.page_index = 3;
    state.toggle_sort(Column::Name);
    assert_eq!(state.sort_direction(Column::Name), Some(SortDirection::Ascending));
    assert_eq!(state.page_index, 0);

    state.toggle_sort(Column::Name);
    assert_eq!(state.sort_direction(Column::Name), Some(SortDirection::Descending));

    state.toggle_sort(Column::Country);
    assert_eq!(state.sort_direction(Column::Name), None);
    assert_eq!(state.sort_direction(Column::Country), Some(SortDirection::Ascending));

    state.toggle_sort(Column::Country);
    state.toggle_sort(Column::Country);
    assert!(state.sort.is_empty());
  }

  #[test]
  fn test_page_navigation() {
    let mut state = TableState::new(5);
    state.next_page(12);
    state.next_page(12);
    state.next_page(12);
    assert_eq!(state.page_index, 2);

    state.prev_page();
    assert_eq!(state.page_index, 1);

    state.last_page(12);
    assert_eq!(state.page_index, 2);

    state.first_page();
    state.prev_page();
    assert_eq!(state.page_index, 0);

    state.goto_page(9, 12);
    assert_eq!(state.page_index, 2);
  }

  #[test]
  fn test_page_size_cycle_keeps_top_row() {
    let mut state = TableState::new(5);
    state.page_index = 3; // rows 15..20
    state.cycle_page_size(true);
    assert_eq!(state.page_size, 10);
    assert_eq!(state.page_index, 1);

    state.cycle_page_size(false);
    assert_eq!(state.page_size, 5);

    state.cycle_page_size(false);
    assert_eq!(state.page_size, 5);

    state.set_page_size(50);
    state.cycle_page_size(true);
    assert_eq!(state.page_size, 50);
  }

  #[test]
  fn test_unique_values_sorted_without_empties() {
    let records = sample();
    assert_eq!(unique_values(Column::Country, &records), vec!["DE", "FR", "US"]);
    assert_eq!(unique_values(Column::Gender, &records), vec!["Female", "Male"]);

    let with_blank = vec![record(1, "x", "", None)];
    assert!(unique_values(Column::Country, &with_blank).is_empty());
  }

  #[test]
  fn test_shortcut_digits() {
    assert_eq!(Column::from_shortcut('1'), Some(Column::Name));
    assert_eq!(Column::from_shortcut('4'), Some(Column::Country));
    assert_eq!(Column::from_shortcut('0'), None);
    assert_eq!(Column::from_shortcut('5'), None);
    assert_eq!(Column::from_shortcut('x'), None);
  }
}
