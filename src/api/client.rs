use crate::api::error::ApiError;
use crate::api::types::{Country, NewRecord, Record, RecordPatch};
use crate::config::ApiConfig;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Thin HTTP client for the records API.
///
/// One network round trip per call and no retries; retrying reads is the
/// cache's job.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
  records_path: String,
  countries_path: String,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", config.base_url, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: base.as_str().trim_end_matches('/').to_string(),
      records_path: normalize_path(&config.records_path),
      countries_path: normalize_path(&config.countries_path),
    })
  }

  /// Base URL the client talks to
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn records_url(&self) -> String {
    format!("{}{}", self.base_url, self.records_path)
  }

  fn record_url(&self, id: &str) -> String {
    format!("{}{}/{}", self.base_url, self.records_path, id)
  }

  /// List all records
  pub async fn list_records(&self) -> Result<Vec<Record>, ApiError> {
    debug!("GET {}", self.records_path);
    decode(self.http.get(self.records_url())).await
  }

  /// Get a single record by id
  pub async fn get_record(&self, id: &str) -> Result<Record, ApiError> {
    decode(self.http.get(self.record_url(id))).await
  }

  /// Send the edited fields of a record, returning the server's copy.
  ///
  /// Only fields present in `patch` are in the body.
  pub async fn update_record(&self, id: &str, patch: &RecordPatch) -> Result<Record, ApiError> {
    debug!("PUT {}/{}", self.records_path, id);
    decode(self.http.put(self.record_url(id)).json(patch)).await
  }

  /// Create a record, returning it with its assigned id
  pub async fn create_record(&self, record: &NewRecord) -> Result<Record, ApiError> {
    decode(self.http.post(self.records_url()).json(record)).await
  }

  /// Delete a record
  pub async fn delete_record(&self, id: &str) -> Result<(), ApiError> {
    send(self.http.delete(self.record_url(id))).await?;
    Ok(())
  }

  /// List the reference countries
  pub async fn list_countries(&self) -> Result<Vec<Country>, ApiError> {
    debug!("GET {}", self.countries_path);
    decode(self.http.get(format!("{}{}", self.base_url, self.countries_path))).await
  }
}

fn normalize_path(path: &str) -> String {
  let trimmed = path.trim().trim_end_matches('/');
  if trimmed.starts_with('/') {
    trimmed.to_string()
  } else {
    format!("/{}", trimmed)
  }
}

/// Send a request, mapping non-2xx responses to `ApiError::Http`
async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
  let response = request
    .send()
    .await
    .map_err(|e| ApiError::Transport(e.to_string()))?;

  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  Err(ApiError::Http {
    status: status.as_u16(),
    body,
  })
}

async fn decode<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
  let body = send(request)
    .await?
    .bytes()
    .await
    .map_err(|e| ApiError::Transport(e.to_string()))?;

  serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
