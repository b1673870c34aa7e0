//! HTTP poll client over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, COOKIE};

use super::{PollClient, ScoreSnapshot};
use crate::agent::Credentials;
use crate::error::PollError;

/// Fetches the score with a GET carrying the bearer token and session cookie.
pub struct HttpPollClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpPollClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PollError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::TransportFailure(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl PollClient for HttpPollClient {
    async fn fetch(&self, credentials: &Credentials) -> Result<ScoreSnapshot, PollError> {
        let bearer = credentials
            .bearer()
            .ok_or_else(|| PollError::TransportFailure("bearer token not set".to_string()))?;
        let session = credentials
            .session()
            .ok_or_else(|| PollError::TransportFailure("session cookie not set".to_string()))?;

        let resp = self
            .client
            .get(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(COOKIE, session)
            .send()
            .await
            .map_err(|e| PollError::TransportFailure(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(PollError::UnexpectedStatus(status.as_u16()));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PollError::MalformedResponse(e.to_string()))?;

        ScoreSnapshot::from_payload(payload)
    }
}
