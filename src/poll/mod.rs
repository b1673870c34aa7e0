//! Poll client: one remote score fetch per call.
//!
//! The worker loop depends only on the [`PollClient`] trait; [`HttpPollClient`]
//! is the production implementation against the airdrop endpoint.

mod http;

pub use http::HttpPollClient;

use async_trait::async_trait;

use crate::agent::Credentials;
use crate::error::PollError;

/// Field of the response body carrying the score.
pub const SCORE_FIELD: &str = "points";

/// Result of one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSnapshot {
    pub score: f64,
    /// Full response body, kept for inspection.
    pub payload: serde_json::Value,
}

impl ScoreSnapshot {
    /// Extract the score from a decoded response body.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, PollError> {
        let score = payload
            .get(SCORE_FIELD)
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| {
                PollError::MalformedResponse(format!("missing numeric '{SCORE_FIELD}' field"))
            })?;
        Ok(Self { score, payload })
    }
}

/// Performs a single remote fetch with the given credentials.
///
/// Implementations must bound the call with a timeout and must not retry.
#[async_trait]
pub trait PollClient: Send + Sync {
    async fn fetch(&self, credentials: &Credentials) -> Result<ScoreSnapshot, PollError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integer_points_accepted() {
        let snap = ScoreSnapshot::from_payload(json!({"points": 12, "rank": 3})).unwrap();
        assert_eq!(snap.score, 12.0);
        assert_eq!(snap.payload["rank"], 3);
    }

    #[test]
    fn fractional_points_accepted() {
        let snap = ScoreSnapshot::from_payload(json!({"points": 1.5})).unwrap();
        assert_eq!(snap.score, 1.5);
    }

    #[test]
    fn missing_points_is_malformed() {
        let err = ScoreSnapshot::from_payload(json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, PollError::MalformedResponse(_)));
    }

    #[test]
    fn non_numeric_points_is_malformed() {
        let err = ScoreSnapshot::from_payload(json!({"points": "12"})).unwrap_err();
        assert!(matches!(err, PollError::MalformedResponse(_)));
    }
}
