/// Store client: the single point of entry for reads against the hosted content
/// store (Supabase, exposed through its PostgREST interface).
///
/// The store is read-only from this service: CV content is edited elsewhere.
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

const REST_PATH: &str = "rest/v1";
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store unavailable after {retries} retries")]
    Unavailable { retries: u32 },
}

impl StoreError {
    /// True when the failure says "not yet" rather than "never": the caller may poll again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable { .. } => true,
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            StoreError::Parse(_) => false,
        }
    }
}

/// PostgREST error envelope.
#[derive(Debug, Deserialize)]
struct RestError {
    message: String,
}

/// Row ordering for a select, rendered as PostgREST's `order=` parameter.
#[derive(Debug, Clone, Copy)]
pub struct Order<'a> {
    pub column: &'a str,
    pub ascending: bool,
}

impl<'a> Order<'a> {
    pub fn asc(column: &'a str) -> Self {
        Self { column, ascending: true }
    }

    pub fn desc(column: &'a str) -> Self {
        Self { column, ascending: false }
    }

    fn to_param(self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{dir}", self.column)
    }
}

#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StoreClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{REST_PATH}/{table}", self.base_url)
    }

    /// Selects every row of `table`, optionally ordered.
    /// Retries on 429 (rate limit), 5xx and timeouts with exponential backoff.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        order: Option<Order<'_>>,
    ) -> Result<Vec<T>, StoreError> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        if let Some(order) = order {
            query.push(("order".to_string(), order.to_param()));
        }

        let mut last_error: Option<StoreError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 250ms, 500ms
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    table,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Store read failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .get(self.table_url(table))
                .query(&query)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("accept", "application/json")
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_error = Some(StoreError::Http(e));
                    continue;
                }
                Err(e) => return Err(StoreError::Http(e)),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Store returned {}: {}", status, body);
                last_error = Some(StoreError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<RestError>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                return Err(StoreError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.bytes().await?;
            let rows: Vec<T> = serde_json::from_slice(&body)?;
            debug!(table, rows = rows.len(), "Store read succeeded");
            return Ok(rows);
        }

        Err(last_error.unwrap_or(StoreError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }

    /// Selects at most one row (PostgREST `maybeSingle` semantics: zero rows is not an error).
    pub async fn select_optional<T: DeserializeOwned>(
        &self,
        table: &str,
    ) -> Result<Option<T>, StoreError> {
        let rows: Vec<T> = self.select(table, None).await?;
        Ok(rows.into_iter().next())
    }
}
