use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod table;

pub use table::{render_table, value_text};

pub const ERROR_PREFIX: &str = "Error: ";

const STATUS_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    #[serde(rename = "UserPrompt")]
    user_prompt: &'a str,
}

/// Body returned by the query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default, rename = "rowData")]
    pub row_data: Option<Vec<Map<String, Value>>>,
}

impl QueryResponse {
    /// The server-reported error, if any. An empty string does not count.
    pub fn server_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|error| !error.is_empty())
    }

    /// The summary as shown to the user. Absent or null is empty text.
    pub fn summary_text(&self) -> String {
        match &self.summary {
            None | Some(Value::Null) => String::new(),
            Some(summary) => value_text(summary),
        }
    }
}

/// Failures before a usable response body was obtained.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("{0}")]
    Transport(String),

    #[error("server responded with {status}: {message}")]
    Status { status: String, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct QueryClient {
    client: Client,
    url: String,
}

impl QueryClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `{"UserPrompt": prompt}` and decodes the answer.
    ///
    /// A non-2xx status is only accepted when its body carries an `error`
    /// field, which is then reported like any other server error.
    pub async fn run_query(&self, prompt: &str) -> Result<QueryResponse, QueryError> {
        let response = self
            .client
            .post(&self.url)
            .json(&QueryRequest {
                user_prompt: prompt,
            })
            .send()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| QueryError::Transport(err.to_string()))?;
        debug!(status = status.as_u16(), bytes = body.len(), "query response received");

        let parsed = serde_json::from_str::<QueryResponse>(&body);
        if !status.is_success() {
            return match parsed {
                Ok(response) if response.server_error().is_some() => Ok(response),
                _ => {
                    warn!(status = status.as_u16(), "query endpoint failed without an error body");
                    Err(QueryError::Status {
                        status: status.to_string(),
                        message: status_message(&body),
                    })
                }
            };
        }

        parsed.map_err(|err| QueryError::Decode(err.to_string()))
    }
}

/// Leading text of a failed response body, for the error message.
fn status_message(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    if body.chars().count() > STATUS_BODY_CHARS {
        let truncated: String = body.chars().take(STATUS_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}

/// Assistant message contents for one finished query, in append order.
pub fn reply_contents(outcome: Result<QueryResponse, QueryError>) -> Vec<String> {
    let response = match outcome {
        Ok(response) => response,
        Err(err) => return vec![format!("{ERROR_PREFIX}{err}")],
    };

    if let Some(error) = response.server_error() {
        return vec![format!("{ERROR_PREFIX}{error}")];
    }

    let mut contents = vec![response.summary_text()];
    if let Some(table) = response
        .row_data
        .as_deref()
        .and_then(render_table)
    {
        contents.push(table);
    }
    contents
}
