//! Perspective-style moderation client
//!
//! Scores text with a `comments:analyze` endpoint and reads the
//! `PROFANITY` summary score:
//!
//! ```text
//! POST {base_url}/comments:analyze?key={api_key}
//! { "comment": { "text": "..." }, "requestedAttributes": { "PROFANITY": {} } }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::ports::ModerationClient;

/// Default production API URL
const PERSPECTIVE_URL: &str = "https://commentanalyzer.googleapis.com/v1alpha1";

const PROFANITY: &str = "PROFANITY";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    comment: Comment<'a>,
    languages: [&'static str; 1],
    requested_attributes: HashMap<&'static str, EmptyObject>,
    do_not_store: bool,
}

#[derive(Debug, Serialize)]
struct Comment<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(default)]
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Debug, Deserialize)]
struct SummaryScore {
    value: f64,
}

/// Perspective API client
#[derive(Debug)]
pub struct PerspectiveClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PerspectiveClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::new_with_base_url(api_key, PERSPECTIVE_URL)
    }

    /// Client against a custom base URL (staging, or a mock server in tests)
    pub fn new_with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "Moderation API key cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Moderation("Moderation request timed out".to_string())
        } else if error.is_connect() {
            Error::Moderation("Unable to connect to the moderation service".to_string())
        } else {
            Error::Moderation(format!("Moderation request failed: {}", error))
        }
    }

    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        match response.status().as_u16() {
            200 => Ok(()),
            400 => Err(Error::Moderation(
                "Moderation service rejected the request".to_string(),
            )),
            401 | 403 => Err(Error::Moderation(
                "Moderation authentication failed. The API key may be invalid.".to_string(),
            )),
            429 => Err(Error::Moderation(
                "Moderation rate limit exceeded".to_string(),
            )),
            status => Err(Error::Moderation(format!(
                "Moderation API error: HTTP {}",
                status
            ))),
        }
    }
}

impl ModerationClient for PerspectiveClient {
    fn name(&self) -> &str {
        "perspective"
    }

    fn score(&self, text: &str) -> Result<f64> {
        let url = format!("{}/comments:analyze", self.base_url);
        let body = AnalyzeRequest {
            comment: Comment { text },
            languages: ["en"],
            requested_attributes: HashMap::from([(PROFANITY, EmptyObject {})]),
            do_not_store: true,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.check_response_status(&response)?;

        let parsed: AnalyzeResponse = response
            .json()
            .map_err(|e| Error::Moderation(format!("Failed to parse moderation response: {}", e)))?;

        parsed
            .attribute_scores
            .get(PROFANITY)
            .map(|score| score.summary_score.value)
            .ok_or_else(|| Error::Moderation("Moderation response has no profanity score".to_string()))
    }
}
