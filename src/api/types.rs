//! Records and countries as the API serves them.
//!
//! The backend is loose about types: ids arrive as strings or integers and
//! `requestDate` may be an RFC 3339 string, an epoch number, `null` or `""`.
//! Everything is normalized on the way in so the rest of the app only sees
//! one shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tax customer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  #[serde(deserialize_with = "de::id")]
  pub id: String,
  #[serde(default, deserialize_with = "de::lenient_string")]
  pub name: String,
  #[serde(default, deserialize_with = "de::lenient_string")]
  pub gender: String,
  #[serde(default, deserialize_with = "de::lenient_string")]
  pub country: String,
  #[serde(default, deserialize_with = "de::lenient_string")]
  pub country_id: String,
  #[serde(default, deserialize_with = "de::request_date")]
  pub request_date: Option<DateTime<Utc>>,
  /// Fields we don't model, written back untouched on update
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Record {
  /// Gender with the first letter capitalized, "-" when empty
  pub fn display_gender(&self) -> String {
    let gender = self.gender.trim();
    let mut chars = gender.chars();
    match chars.next() {
      Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
      None => "-".to_string(),
    }
  }

  pub fn is_male(&self) -> bool {
    self.gender.trim().eq_ignore_ascii_case("male")
  }

  /// Request date as "Jan 5, 2024", "-" when missing
  pub fn display_request_date(&self) -> String {
    match self.request_date {
      Some(date) => date.format("%b %-d, %Y").to_string(),
      None => "-".to_string(),
    }
  }
}

/// A country from the reference collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
  #[serde(deserialize_with = "de::id")]
  pub id: String,
  #[serde(default, deserialize_with = "de::lenient_string")]
  pub name: String,
}

/// Partial update of the user-editable record fields.
///
/// `None` fields are left untouched when merged onto a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country_id: Option<String>,
}

impl RecordPatch {
  pub fn merge_into(&self, record: &mut Record) {
    if let Some(name) = &self.name {
      record.name = name.clone();
    }
    if let Some(country) = &self.country {
      record.country = country.clone();
    }
    if let Some(country_id) = &self.country_id {
      record.country_id = country_id.clone();
    }
  }
}

/// Body for creating a record; the server assigns the id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
  pub name: String,
  pub gender: String,
  pub country: String,
  pub country_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_date: Option<DateTime<Utc>>,
}

mod de {
  use super::*;
  use serde::de::Error;
  use serde::Deserializer;

  /// Epoch values above this are taken to be milliseconds
  const MILLIS_THRESHOLD: i64 = 100_000_000_000;

  pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
      Value::String(s) => Ok(s),
      Value::Number(n) => Ok(n.to_string()),
      other => Err(D::Error::custom(format!("invalid id: {}", other))),
    }
  }

  pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
      Value::Null => Ok(String::new()),
      Value::String(s) => Ok(s),
      Value::Number(n) => Ok(n.to_string()),
      Value::Bool(b) => Ok(b.to_string()),
      other => Err(D::Error::custom(format!("expected a string, got {}", other))),
    }
  }

  pub fn request_date<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
      Value::String(s) => parse_date(&s),
      Value::Number(n) => n.as_i64().and_then(from_epoch),
      _ => None,
    })
  }

  fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
      return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
      return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
      return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    s.parse::<i64>().ok().and_then(from_epoch)
  }

  fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= MILLIS_THRESHOLD {
      DateTime::from_timestamp_millis(value)
    } else {
      DateTime::from_timestamp(value, 0)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_numeric_ids_become_strings() {
    let r = record(json!({ "id": 7, "name": "Acme", "countryId": 3 }));
    assert_eq!(r.id, "7");
    assert_eq!(r.country_id, "3");
  }

  #[test]
  fn test_request_date_shapes() {
    let iso = record(json!({ "id": "1", "requestDate": "2024-01-05T10:00:00.000Z" }));
    assert_eq!(iso.display_request_date(), "Jan 5, 2024");

    let millis = record(json!({ "id": "1", "requestDate": 1704448800000i64 }));
    assert_eq!(millis.request_date, iso.request_date);

    let seconds = record(json!({ "id": "1", "requestDate": 1704448800 }));
    assert_eq!(seconds.request_date, iso.request_date);

    let plain = record(json!({ "id": "1", "requestDate": "2024-01-05" }));
    assert_eq!(plain.display_request_date(), "Jan 5, 2024");

    for missing in [json!(null), json!(""), json!("not a date")] {
      let r = record(json!({ "id": "1", "requestDate": missing }));
      assert_eq!(r.request_date, None);
      assert_eq!(r.display_request_date(), "-");
    }

    let absent = record(json!({ "id": "1" }));
    assert_eq!(absent.request_date, None);
  }

  #[test]
  fn test_null_strings_default_to_empty() {
    let r = record(json!({ "id": "1", "name": null, "gender": null }));
    assert_eq!(r.name, "");
    assert_eq!(r.display_gender(), "-");
  }

  #[test]
  fn test_display_gender_normalizes_case() {
    let r = record(json!({ "id": "1", "gender": "mALE" }));
    assert_eq!(r.display_gender(), "Male");
    assert!(r.is_male());

    let r = record(json!({ "id": "1", "gender": "female" }));
    assert_eq!(r.display_gender(), "Female");
    assert!(!r.is_male());
  }

  #[test]
  fn test_unknown_fields_survive_round_trip() {
    let r = record(json!({ "id": "1", "name": "Acme", "avatar": "a.png" }));
    let back = serde_json::to_value(&r).unwrap();
    assert_eq!(back["avatar"], "a.png");
    assert_eq!(back["countryId"], "");
  }

  #[test]
  fn test_patch_only_touches_present_fields() {
    let mut r = record(json!({ "id": "1", "name": "Acme", "country": "US", "countryId": "1" }));
    let patch = RecordPatch {
      name: Some("Acme Corp".to_string()),
      ..Default::default()
    };
    patch.merge_into(&mut r);
    assert_eq!(r.name, "Acme Corp");
    assert_eq!(r.country, "US");
    assert_eq!(r.country_id, "1");

    let body = serde_json::to_value(&patch).unwrap();
    assert_eq!(body, json!({ "name": "Acme Corp" }));
  }
}
