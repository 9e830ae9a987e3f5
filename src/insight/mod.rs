//! Remote insight generation.
//!
//! The dashboard asks a remote generator for narrative analysis of the current
//! filter. This module holds the wire types for that exchange, the
//! `InsightGenerator` seam, the HTTP implementation, and the scheduler that
//! decides when a request is sent.
//!
//! Every field of a report may be missing or `null`; a report with nothing in
//! it renders as a placeholder instead of failing.

mod client;
pub mod scheduler;

pub use client::HttpInsightGenerator;
pub use scheduler::{
    Outcome, SchedulerConfig, SchedulerCore, SchedulerHandle, SchedulerPhase, SchedulerSnapshot,
    Ticket, Trigger, spawn_scheduler,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::Selection;

/// Text shown wherever a report (or one of its sections) has no content.
pub const EMPTY_PLACEHOLDER: &str = "No insight available yet.";

/// Errors from a remote insight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsightError {
    /// Token missing, invalid or expired (401 Unauthorized)
    #[error("Insight generator rejected the credentials: 401 Unauthorized")]
    Unauthorized,

    /// Token lacks the admin or manager role (403 Forbidden)
    #[error("Insight generator denied access: 403 Forbidden")]
    Forbidden,

    /// Network failure or unexpected status
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response body was not an insight envelope
    #[error("Failed to parse insight response: {0}")]
    Parse(String),

    /// No response within the configured timeout
    #[error("Insight request timed out")]
    Timeout,
}

/// Payload sent to the generator: the reconciled selection as sorted lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub group_ids: Vec<String>,
    pub project_ids: Vec<String>,
    pub user_ids: Vec<String>,
}

impl From<&Selection> for InsightRequest {
    fn from(selection: &Selection) -> Self {
        Self {
            group_ids: selection.group_ids.iter().cloned().collect(),
            project_ids: selection.project_ids.iter().cloned().collect(),
            user_ids: selection.user_ids.iter().cloned().collect(),
        }
    }
}

/// A titled block of narrative: optional summary plus bullet points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightSection {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub bullets: Vec<String>,
}

impl InsightSection {
    pub fn is_empty(&self) -> bool {
        self.summary.as_deref().is_none_or(|s| s.trim().is_empty()) && self.bullets.is_empty()
    }
}

/// Per-user narrative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInsight {
    #[serde(default, deserialize_with = "lenient")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub overview: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub conclusions: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recommendations: Vec<String>,
}

/// Generator output for one filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightReport {
    #[serde(default, deserialize_with = "lenient")]
    pub overview: InsightSection,
    #[serde(default, deserialize_with = "lenient")]
    pub conclusions: InsightSection,
    #[serde(default, deserialize_with = "lenient")]
    pub recommendations: InsightSection,
    #[serde(default, deserialize_with = "lenient")]
    pub task_insights: InsightSection,
    #[serde(default, deserialize_with = "lenient")]
    pub user_insights: Vec<UserInsight>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Error reported by the generator inside an otherwise successful response
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
}

impl InsightReport {
    /// Parse a generator response.
    ///
    /// Accepts the `{"insight": report | null}` envelope or a bare report.
    /// `Ok(None)` means the generator has nothing for this filter yet.
    pub fn from_response(value: Value) -> Result<Option<Self>, InsightError> {
        let Value::Object(mut map) = value else {
            return Err(InsightError::Parse("expected a JSON object".to_string()));
        };
        let report = match map.remove("insight") {
            Some(Value::Null) => return Ok(None),
            Some(inner @ Value::Object(_)) => inner,
            Some(other) => {
                return Err(InsightError::Parse(format!(
                    "\"insight\" must be an object or null, got {}",
                    other
                )));
            }
            None => Value::Object(map),
        };
        serde_json::from_value(report)
            .map(Some)
            .map_err(|e| InsightError::Parse(e.to_string()))
    }

    /// True when no section carries any text.
    pub fn is_empty(&self) -> bool {
        self.overview.is_empty()
            && self.conclusions.is_empty()
            && self.recommendations.is_empty()
            && self.task_insights.is_empty()
            && self.user_insights.is_empty()
    }

    /// Plain-text rendering with placeholders for absent sections.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(err) = self.ai_error.as_deref().filter(|e| !e.trim().is_empty()) {
            lines.push(format!("Generator error: {}", err));
        }
        if self.is_empty() {
            lines.push(EMPTY_PLACEHOLDER.to_string());
            return lines;
        }

        for (title, section) in [
            ("Overview", &self.overview),
            ("Conclusions", &self.conclusions),
            ("Recommendations", &self.recommendations),
            ("Task insights", &self.task_insights),
        ] {
            lines.push(format!("{}:", title));
            if section.is_empty() {
                lines.push(format!("  {}", EMPTY_PLACEHOLDER));
                continue;
            }
            if let Some(summary) = section.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                lines.push(format!("  {}", summary.trim()));
            }
            lines.extend(section.bullets.iter().map(|b| format!("  - {}", b)));
        }

        for user in &self.user_insights {
            let name = if user.name.is_empty() { &user.user_id } else { &user.name };
            lines.push(format!("{}:", name));
            let bullets = user
                .overview
                .iter()
                .chain(&user.conclusions)
                .chain(&user.recommendations);
            let before = lines.len();
            lines.extend(bullets.map(|b| format!("  - {}", b)));
            if lines.len() == before {
                lines.push(format!("  {}", EMPTY_PLACEHOLDER));
            }
        }

        if let Some(at) = &self.generated_at {
            lines.push(format!("Generated at {}", at));
        }
        lines
    }
}

/// Render an optional report; `None` becomes the placeholder line.
pub fn render_report(report: Option<&InsightReport>) -> Vec<String> {
    match report {
        Some(report) => report.render_lines(),
        None => vec![EMPTY_PLACEHOLDER.to_string()],
    }
}

/// Remote collaborator that turns a filter payload into a report.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Request analysis for `request`. `Ok(None)` means no insight is available.
    async fn generate(&self, request: &InsightRequest) -> Result<Option<InsightReport>, InsightError>;
}

/// Fields fall back to their default for `null` or a mistyped value.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
