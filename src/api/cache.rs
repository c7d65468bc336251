//! Caching implementations for API types.

use crate::cache::{Cacheable, Patch, QueryKey};

use super::types::{Country, Record, RecordPatch};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Record {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "record"
  }
}

impl Cacheable for Country {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    "country"
  }
}

impl Patch<Record> for RecordPatch {
  fn apply(&self, target: &mut Record) {
    self.merge_into(target);
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Collections served by the API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiQueryKey {
  Records,
  Countries,
}

impl QueryKey for ApiQueryKey {
  fn cache_hash(&self) -> String {
    match self {
      Self::Records => "records",
      Self::Countries => "countries",
    }
    .to_string()
  }

  fn description(&self) -> String {
    match self {
      Self::Records => "tax records".to_string(),
      Self::Countries => "countries".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::merge_patch;

  #[test]
  fn test_query_keys_are_distinct() {
    assert_eq!(ApiQueryKey::Records.cache_hash(), "records");
    assert_eq!(ApiQueryKey::Countries.cache_hash(), "countries");
    assert_eq!(ApiQueryKey::Records.description(), "tax records");
  }

  #[test]
  fn test_record_patch_merges_by_id() {
    let records: Vec<Record> = serde_json::from_str(
      r#"[{"id": 1, "name": "Acme", "country": "US", "countryId": 1},
          {"id": 2, "name": "Globex", "country": "DE", "countryId": 2}]"#,
    )
    .unwrap();
    let patch = RecordPatch {
      name: Some("Acme Corp".to_string()),
      ..Default::default()
    };

    let merged = merge_patch(&records, "1", &patch);
    assert_eq!(merged[0].name, "Acme Corp");
    assert_eq!(merged[0].country, "US");
    assert_eq!(merged[1], records[1]);
  }
}
