//! KDL schema for sextant.kdl.
//!
//! This module provides:
//! - The `SextantConfig` struct mirroring the file
//! - Conversion to and from KDL documents
//! - Validation and layered merging
//!
//! # KDL Schema
//!
//! ```kdl
//! insight-endpoint "https://dash.example.com/api/ai/admin/insights/filters"
//! api-token "eyJhbGciOi..."
//! debounce-ms 3500
//! request-timeout-secs 30
//! output-format "human"  // or "json"
//! data-file "snapshot.json"  // or an http(s):// API base URL
//! ```

use std::path::Path;

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound for `debounce-ms` (ten minutes).
pub const MAX_DEBOUNCE_MS: u64 = 600_000;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings stored in a sextant.kdl file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SextantConfig {
    /// Full URL of the filter insight endpoint
    pub insight_endpoint: Option<String>,

    /// Bearer token for the dashboard API (sensitive)
    pub api_token: Option<String>,

    /// Quiet period before an automatic insight request
    pub debounce_ms: Option<u64>,

    /// Per-request timeout for remote calls
    pub request_timeout_secs: Option<u64>,

    pub output_format: Option<OutputFormat>,

    /// Entity snapshot path, or API base URL
    pub data_file: Option<String>,
}

impl SextantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ms) = self.debounce_ms {
            validate_debounce_ms(ms)?;
        }
        if let Some(secs) = self.request_timeout_secs {
            validate_timeout_secs(secs)?;
        }
        if let Some(endpoint) = &self.insight_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!(
                    "insight-endpoint must be an http(s) URL, got {:?}",
                    endpoint
                ));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            insight_endpoint: string_value(doc, "insight-endpoint"),
            api_token: string_value(doc, "api-token"),
            // Negative numbers become 0 so validation rejects them
            debounce_ms: integer_value(doc, "debounce-ms").map(|i| u64::try_from(i).unwrap_or(0)),
            request_timeout_secs: integer_value(doc, "request-timeout-secs")
                .map(|i| u64::try_from(i).unwrap_or(0)),
            output_format: string_value(doc, "output-format").and_then(|s| OutputFormat::parse(&s)),
            data_file: string_value(doc, "data-file"),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        let strings = [
            ("insight-endpoint", self.insight_endpoint.clone()),
            ("api-token", self.api_token.clone()),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                push_node(&mut doc, name, KdlValue::String(value));
            }
        }
        if let Some(ms) = self.debounce_ms {
            push_node(&mut doc, "debounce-ms", KdlValue::Integer(ms as i128));
        }
        if let Some(secs) = self.request_timeout_secs {
            push_node(&mut doc, "request-timeout-secs", KdlValue::Integer(secs as i128));
        }
        if let Some(format) = self.output_format {
            push_node(&mut doc, "output-format", KdlValue::String(format.as_str().to_string()));
        }
        if let Some(ref data) = self.data_file {
            push_node(&mut doc, "data-file", KdlValue::String(data.clone()));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &SextantConfig) {
        if other.insight_endpoint.is_some() {
            self.insight_endpoint = other.insight_endpoint.clone();
        }
        if other.api_token.is_some() {
            self.api_token = other.api_token.clone();
        }
        if other.debounce_ms.is_some() {
            self.debounce_ms = other.debounce_ms;
        }
        if other.request_timeout_secs.is_some() {
            self.request_timeout_secs = other.request_timeout_secs;
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        if other.data_file.is_some() {
            self.data_file = other.data_file.clone();
        }
    }

    /// Read and validate a config file. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let doc: KdlDocument = raw.parse()?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|msg| Error::InvalidConfig(format!("{}: {}", path.display(), msg)))?;
        Ok(config)
    }
}

pub fn validate_debounce_ms(ms: u64) -> std::result::Result<(), String> {
    if ms == 0 || ms > MAX_DEBOUNCE_MS {
        return Err(format!(
            "debounce-ms must be 1-{}, got {}",
            MAX_DEBOUNCE_MS, ms
        ));
    }
    Ok(())
}

pub fn validate_timeout_secs(secs: u64) -> std::result::Result<(), String> {
    if secs == 0 {
        return Err("request-timeout-secs must be greater than 0".to_string());
    }
    Ok(())
}

fn string_value(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

fn integer_value(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_integer())
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

/// Secrets shorter than this are masked without revealing any character.
const MASK_MIN_LEN: usize = 16;

/// Mask a secret for display: first and last four characters only, or
/// nothing at all for short secrets.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < MASK_MIN_LEN {
        "****".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
