//! Error taxonomy for the remote data gateway.

use thiserror::Error;

/// A failed round trip to the records API.
///
/// Errors are `Clone` so a single failed load can be handed to every caller
/// that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// No response reached us (DNS, refused connection, reset, TLS).
  #[error("network error: {0}")]
  Transport(String),

  /// The server answered with a non-2xx status.
  #[error("HTTP {status}{}", body_suffix(.body))]
  Http { status: u16, body: String },

  /// The server answered 2xx but the body did not decode.
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl ApiError {
  /// HTTP status code, if the server responded at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }
}

fn body_suffix(body: &str) -> String {
  if body.is_empty() {
    String::new()
  } else {
    format!(": {}", body)
  }
}
