use std::collections::{BTreeMap, BTreeSet};

use super::column::Column;
use crate::config::PAGE_SIZES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Ascending,
  Descending,
}

impl SortDirection {
  pub fn indicator(&self) -> &'static str {
    match self {
      SortDirection::Ascending => "▲",
      SortDirection::Descending => "▼",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
  pub column: Column,
  pub direction: SortDirection,
}

/// Client-side view state of the records table.
///
/// Sorting, filtering and searching reset to the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
  /// Applied in order; later keys break ties of earlier ones
  pub sort: Vec<SortKey>,
  /// Selected values per column; an empty or absent set filters nothing
  pub filters: BTreeMap<Column, BTreeSet<String>>,
  pub search: String,
  pub page_index: usize,
  pub page_size: usize,
}

impl Default for TableState {
  fn default() -> Self {
    Self::new(PAGE_SIZES[0])
  }
}

impl TableState {
  pub fn new(page_size: usize) -> Self {
    Self {
      sort: Vec::new(),
      filters: BTreeMap::new(),
      search: String::new(),
      page_index: 0,
      page_size: page_size.max(1),
    }
  }

  pub fn page_count(&self, total_rows: usize) -> usize {
    total_rows.div_ceil(self.page_size.max(1)).max(1)
  }

  /// Pull the page index back inside `[0, page_count - 1]`
  pub fn clamp_page(&mut self, total_rows: usize) {
    let last = self.page_count(total_rows) - 1;
    if self.page_index > last {
      self.page_index = last;
    }
  }

  // Sorting

  pub fn sort_direction(&self, column: Column) -> Option<SortDirection> {
    self
      .sort
      .iter()
      .find(|key| key.column == column)
      .map(|key| key.direction)
  }

  /// Cycle `column` through ascending, descending and unsorted.
  ///
  /// Sorting by a new column replaces the previous sort.
  pub fn toggle_sort(&mut self, column: Column) {
    let next = match self.sort_direction(column) {
      None => Some(SortDirection::Ascending),
      Some(SortDirection::Ascending) => Some(SortDirection::Descending),
      Some(SortDirection::Descending) => None,
    };
    self.sort = next
      .map(|direction| vec![SortKey { column, direction }])
      .unwrap_or_default();
    self.page_index = 0;
  }

  // Filtering

  pub fn filter_values(&self, column: Column) -> Option<&BTreeSet<String>> {
    self.filters.get(&column).filter(|values| !values.is_empty())
  }

  pub fn is_selected(&self, column: Column, value: &str) -> bool {
    self
      .filters
      .get(&column)
      .is_some_and(|values| values.contains(value))
  }

  pub fn toggle_filter(&mut self, column: Column, value: &str) {
    let values = self.filters.entry(column).or_default();
    if !values.remove(value) {
      values.insert(value.to_string());
    }
    if values.is_empty() {
      self.filters.remove(&column);
    }
    self.page_index = 0;
  }

  pub fn clear_filter(&mut self, column: Column) {
    self.filters.remove(&column);
    self.page_index = 0;
  }

  pub fn set_search(&mut self, search: &str) {
    if self.search != search {
      self.search = search.to_string();
      self.page_index = 0;
    }
  }

  // Pagination

  pub fn first_page(&mut self) {
    self.page_index = 0;
  }

  pub fn prev_page(&mut self) {
    self.page_index = self.page_index.saturating_sub(1);
  }

  pub fn next_page(&mut self, total_rows: usize) {
    if self.page_index + 1 < self.page_count(total_rows) {
      self.page_index += 1;
    }
  }

  pub fn last_page(&mut self, total_rows: usize) {
    self.page_index = self.page_count(total_rows) - 1;
  }

  pub fn goto_page(&mut self, index: usize, total_rows: usize) {
    self.page_index = index;
    self.clamp_page(total_rows);
  }

  /// Change rows per page, keeping the first visible row on screen
  pub fn set_page_size(&mut self, page_size: usize) {
    let page_size = page_size.max(1);
    let first_row = self.page_index * self.page_size;
    self.page_size = page_size;
    self.page_index = first_row / page_size;
  }

  /// Step to the next (or previous) size in `PAGE_SIZES`
  pub fn cycle_page_size(&mut self, forward: bool) {
    let next = if forward {
      PAGE_SIZES.iter().find(|&&size| size > self.page_size)
    } else {
      PAGE_SIZES.iter().rev().find(|&&size| size < self.page_size)
    };
    if let Some(&size) = next {
      self.set_page_size(size);
    }
  }
}
