//! HTTP client for the hosted data platform.
//!
//! Everything relational, identity-shaped or file-shaped is delegated to a
//! Supabase-compatible platform: a row API under `/rest/v1`, auth under
//! `/auth/v1` and object storage under `/storage/v1`. This module owns the
//! request/response glue and the error taxonomy; it deliberately contains no
//! query engine of its own.

pub mod auth;
pub mod storage;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("platform returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// Duplicate-key violation. Surfaced as its own variant because the
    /// favorites flow treats it as "already favorited", not as a failure.
    #[error("duplicate row: {0}")]
    Conflict(String),
    #[error("expected a row, the platform returned none")]
    MissingRow,
}

impl PlatformError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Error body returned by the platform's row API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

const DUPLICATE_KEY_CODE: &str = "23505";

/// Client for the hosted platform's HTTP API.
///
/// Cheap to clone; `as_user` produces a clone that authenticates row and
/// storage operations with a signed-in user's access token so the platform's
/// row-level policies apply.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bearer: String,
}

impl PlatformClient {
    #[must_use]
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bearer: anon_key.to_string(),
        }
    }

    /// A clone of this client that sends `access_token` as the bearer.
    #[must_use]
    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            bearer: access_token.to_string(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", self.anon_key.as_str())
            .bearer_auth(&self.bearer)
    }

    /// Select rows from a table. `query` is passed through as URL query
    /// pairs (PostgREST filter/order syntax, e.g. `("category_id", "eq.3")`).
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, PlatformError> {
        let response = self
            .authed(self.http.get(self.rest_url(table)).query(query))
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Select at most one row, `None` when no row matches.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, PlatformError> {
        let mut query = query.to_vec();
        query.push(("limit", "1"));
        let mut rows = self.select::<T>(table, &query).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Insert a row and return the stored representation.
    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl Serialize,
    ) -> Result<T, PlatformError> {
        let response = self
            .authed(self.http.post(self.rest_url(table)).json(body))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = check(response).await?;
        let mut rows: Vec<T> = response.json().await?;
        if rows.is_empty() {
            return Err(PlatformError::MissingRow);
        }
        Ok(rows.swap_remove(0))
    }

    /// Insert a row without reading it back.
    pub async fn insert_only(
        &self,
        table: &str,
        body: &impl Serialize,
    ) -> Result<(), PlatformError> {
        let response = self
            .authed(self.http.post(self.rest_url(table)).json(body))
            .header("Prefer", "return=minimal")
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Upsert on the table's primary key, returning the stored row.
    pub async fn upsert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &impl Serialize,
    ) -> Result<T, PlatformError> {
        let response = self
            .authed(self.http.post(self.rest_url(table)).json(body))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .send()
            .await?;
        let response = check(response).await?;
        let mut rows: Vec<T> = response.json().await?;
        if rows.is_empty() {
            return Err(PlatformError::MissingRow);
        }
        Ok(rows.swap_remove(0))
    }

    /// Update matching rows and return their stored representations.
    pub async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
        body: &impl Serialize,
    ) -> Result<Vec<T>, PlatformError> {
        let response = self
            .authed(self.http.patch(self.rest_url(table)).query(query).json(body))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Delete matching rows.
    pub async fn delete(&self, table: &str, query: &[(&str, &str)]) -> Result<(), PlatformError> {
        let response = self
            .authed(self.http.delete(self.rest_url(table)).query(query))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Call a stored procedure under `/rest/v1/rpc`.
    pub async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &impl Serialize,
    ) -> Result<T, PlatformError> {
        let url = format!("{}/rest/v1/rpc/{function}", self.base_url);
        let response = self.authed(self.http.post(url).json(args)).send().await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Count rows matching `query` without transferring them.
    pub async fn count(&self, table: &str, query: &[(&str, &str)]) -> Result<i64, PlatformError> {
        let mut query = query.to_vec();
        query.push(("select", "id"));
        query.push(("limit", "1"));
        let response = self
            .authed(self.http.get(self.rest_url(table)).query(&query))
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check(response).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|total| total.parse::<i64>().ok());
        total.ok_or(PlatformError::MissingRow)
    }
}

/// Map a non-success response to the error taxonomy.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
        code: None,
        message: None,
    });
    let message = body.message.unwrap_or_else(|| status.to_string());

    if status == reqwest::StatusCode::CONFLICT || body.code.as_deref() == Some(DUPLICATE_KEY_CODE) {
        return Err(PlatformError::Conflict(message));
    }

    Err(PlatformError::Api {
        status: status.as_u16(),
        code: body.code,
        message,
    })
}
