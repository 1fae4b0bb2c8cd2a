use crate::error::{ConfigError, ParseError, RemoteError, TransportError};
use crate::models::{RemoteResponse, SubmissionRecord};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::str::FromStr;

// How a ballot reaches the spreadsheet endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStrategy {
    LocalOnly,
    FormPost,
    JsonPost,
}

impl SubmissionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionStrategy::LocalOnly => "local",
            SubmissionStrategy::FormPost => "form",
            SubmissionStrategy::JsonPost => "json",
        }
    }

    pub fn needs_endpoint(&self) -> bool {
        !matches!(self, SubmissionStrategy::LocalOnly)
    }
}

impl FromStr for SubmissionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SubmissionStrategy::LocalOnly),
            "form" => Ok(SubmissionStrategy::FormPost),
            "json" => Ok(SubmissionStrategy::JsonPost),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

// The remote collaborator: accepts a record, optionally answers with the aggregate tally
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(&self, record: &SubmissionRecord) -> Result<RemoteResponse, RemoteError>;

    /// Secondary fetch of the aggregate results, used when the submission
    /// response carried no usable numbers.
    async fn fetch_results(&self) -> Result<RemoteResponse, RemoteError>;
}

pub struct HttpSubmissionClient {
    client: Client,
    endpoint: String,
    strategy: SubmissionStrategy,
}

impl HttpSubmissionClient {
    pub fn new(endpoint: impl Into<String>, strategy: SubmissionStrategy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into(),
            strategy,
        })
    }
}

#[async_trait]
impl SubmissionClient for HttpSubmissionClient {
    async fn submit(&self, record: &SubmissionRecord) -> Result<RemoteResponse, RemoteError> {
        let request = self.client.post(&self.endpoint);
        let request = match self.strategy {
            SubmissionStrategy::FormPost => request.form(record),
            _ => request.json(record),
        };

        let body = read_body(request.send().await.map_err(TransportError::from)?).await?;
        debug!("Submission response ({} bytes)", body.len());

        let response = match self.strategy {
            SubmissionStrategy::FormPost => parse_embedded(&body)?,
            _ => parse_envelope(&body)?,
        };
        Ok(response)
    }

    async fn fetch_results(&self) -> Result<RemoteResponse, RemoteError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "results")])
            .send()
            .await
            .map_err(TransportError::from)?;

        let body = read_body(response).await?;
        Ok(parse_envelope(&body)?)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("request failed");
        return Err(TransportError::new(Some(status.as_u16()), reason));
    }
    Ok(response.text().await?)
}

/// Parses a `{success, results}` envelope from a JSON body.
pub fn parse_envelope(body: &str) -> Result<RemoteResponse, ParseError> {
    serde_json::from_str(body.trim()).map_err(|e| ParseError::new(e.to_string()))
}

/// Finds the first response envelope in a body that may be wrapped in markup.
///
/// Form posts answer with an HTML page, so every `{` is tried in turn and the
/// first JSON object carrying a `success` key wins. CSS and script braces
/// before the payload are skipped.
pub fn parse_embedded(body: &str) -> Result<RemoteResponse, ParseError> {
    for (start, _) in body.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<serde_json::Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            _ => continue,
        };
        if value.get("success").is_some() {
            return serde_json::from_value(value).map_err(|e| ParseError::new(e.to_string()));
        }
    }
    Err(ParseError::new("no JSON object in response body"))
}
