//! HTTP insight generator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::{InsightError, InsightGenerator, InsightReport, InsightRequest};

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("sextant/", env!("CARGO_PKG_VERSION"));

/// Posts the filter payload to a remote endpoint and parses the envelope.
#[derive(Debug, Clone)]
pub struct HttpInsightGenerator {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpInsightGenerator {
    /// Create a generator for `endpoint` (the full URL of the filter insight route).
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, InsightError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| InsightError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[async_trait]
impl InsightGenerator for HttpInsightGenerator {
    async fn generate(&self, request: &InsightRequest) -> Result<Option<InsightReport>, InsightError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            groups = request.group_ids.len(),
            projects = request.project_ids.len(),
            users = request.user_ids.len(),
            "requesting insight"
        );

        let response = builder.send().await.map_err(map_transport_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(InsightError::Unauthorized),
            StatusCode::FORBIDDEN => return Err(InsightError::Forbidden),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(InsightError::Http(format!("HTTP {}: {}", status.as_u16(), body)));
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InsightError::Timeout
            } else {
                InsightError::Parse(e.to_string())
            }
        })?;
        InsightReport::from_response(body)
    }
}

fn map_transport_error(err: reqwest::Error) -> InsightError {
    if err.is_timeout() {
        InsightError::Timeout
    } else {
        InsightError::Http(err.to_string())
    }
}
