//! Edit form controller for a single record.

use thiserror::Error;

use crate::api::{Country, Record, RecordPatch};

pub const SAVE_SUCCESS: &str = "Customer updated successfully!";
pub const SAVE_FAILURE: &str = "Failed to update customer";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("Name is required")]
  NameRequired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormPhase {
  #[default]
  Closed,
  Open,
  Submitting,
}

/// Editable fields of the record being edited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
  pub name: String,
  pub country: String,
  pub country_id: String,
}

/// State machine behind the edit modal.
///
/// `Closed -> Open -> Submitting -> Closed` on success, back to `Open` with
/// the entered values and a submit error on failure. Validation failures
/// never leave `Open`.
#[derive(Debug, Clone, Default)]
pub struct EditForm {
  phase: FormPhase,
  record: Option<Record>,
  fields: FormFields,
  name_error: Option<ValidationError>,
  submit_error: Option<String>,
}

impl EditForm {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn phase(&self) -> FormPhase {
    self.phase
  }

  pub fn is_open(&self) -> bool {
    self.phase != FormPhase::Closed
  }

  pub fn is_submitting(&self) -> bool {
    self.phase == FormPhase::Submitting
  }

  /// The record as it was when the form opened
  pub fn record(&self) -> Option<&Record> {
    self.record.as_ref()
  }

  pub fn fields(&self) -> &FormFields {
    &self.fields
  }

  pub fn name_error(&self) -> Option<&ValidationError> {
    self.name_error.as_ref()
  }

  pub fn submit_error(&self) -> Option<&str> {
    self.submit_error.as_deref()
  }

  /// Open prefilled from `record`
  pub fn open(&mut self, record: &Record) {
    self.phase = FormPhase::Open;
    self.fields = FormFields {
      name: record.name.clone(),
      country: record.country.clone(),
      country_id: record.country_id.clone(),
    };
    self.record = Some(record.clone());
    self.name_error = None;
    self.submit_error = None;
  }

  pub fn set_name(&mut self, name: &str) {
    if self.phase != FormPhase::Open {
      return;
    }
    self.fields.name = name.to_string();
    self.name_error = None;
  }

  pub fn select_country(&mut self, country: &Country) {
    if self.phase != FormPhase::Open {
      return;
    }
    self.fields.country = country.name.clone();
    self.fields.country_id = country.id.clone();
  }

  /// Validate and move to `Submitting`, yielding the patch to send.
  ///
  /// Returns `None` when the form isn't open.
  pub fn submit(&mut self) -> Option<Result<RecordPatch, ValidationError>> {
    if self.phase != FormPhase::Open {
      return None;
    }

    let name = self.fields.name.trim();
    if name.is_empty() {
      self.name_error = Some(ValidationError::NameRequired);
      return Some(Err(ValidationError::NameRequired));
    }

    let patch = RecordPatch {
      name: Some(name.to_string()),
      country: Some(self.fields.country.clone()),
      country_id: Some(self.fields.country_id.clone()),
    };
    self.phase = FormPhase::Submitting;
    self.submit_error = None;
    Some(Ok(patch))
  }

  /// Settle a submission: close on success, reopen with the error otherwise
  pub fn finish<E: std::fmt::Display>(&mut self, result: Result<(), E>) {
    if self.phase != FormPhase::Submitting {
      return;
    }
    match result {
      Ok(()) => self.reset(),
      Err(e) => {
        self.phase = FormPhase::Open;
        self.submit_error = Some(e.to_string());
      }
    }
  }

  /// Dismiss the form; ignored while a submission is in flight
  pub fn close(&mut self) {
    if self.phase == FormPhase::Submitting {
      return;
    }
    self.reset();
  }

  fn reset(&mut self) {
    *self = Self::default();
  }
}
