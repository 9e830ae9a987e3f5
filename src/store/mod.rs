//! Entity store boundary.
//!
//! Loads the four raw collections from a JSON snapshot on disk or from the
//! dashboard's REST API. Loose upstream shapes are normalized by the serde
//! impls in `models`; nothing past this module sees raw JSON.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{Entities, Group, Project, Task, User};
use crate::{Error, Result};

/// Whether entities have been loaded, and how that went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loaded,
    /// Load failed; the engine runs on empty collections
    Unavailable(String),
}

impl LoadState {
    /// Loaded or failed: either way, reconciliation may run.
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadState::NotLoaded)
    }
}

/// Source of the raw entity collections.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load(&self) -> Result<Entities>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads a `{groups, projects, users, tasks}` snapshot from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EntityStore for JsonFileStore {
    async fn load(&self) -> Result<Entities> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let entities: Entities = serde_json::from_str(&raw)?;
        Ok(entities.normalized())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fetches each collection from `GET {base}/api/<collection>`.
#[derive(Debug, Clone)]
pub struct HttpEntityStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpEntityStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sextant/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let url = format!("{}/api/{}", self.base_url, collection);
        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        let body: Value = response.json().await?;
        Ok(records_from_body(body, collection))
    }
}

#[async_trait]
impl EntityStore for HttpEntityStore {
    async fn load(&self) -> Result<Entities> {
        let (groups, projects, users, tasks) = tokio::try_join!(
            self.fetch::<Group>("groups"),
            self.fetch::<Project>("projects"),
            self.fetch::<User>("users"),
            self.fetch::<Task>("tasks"),
        )?;
        Ok(Entities::new(groups, projects, users, tasks))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Accept a bare array or an object wrapping it under the collection name
/// (or `items`/`data`). Records that fail to parse are skipped.
fn records_from_body<T: DeserializeOwned>(body: Value, collection: &str) -> Vec<T> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => [collection, "items", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if records.len() < total {
        tracing::debug!(collection, skipped = total - records.len(), "skipped malformed records");
    }
    records
}

/// Pick a store for `source`: `http(s)://` URLs go to the REST API, anything
/// else is a snapshot file path.
pub fn store_for(source: &str, token: Option<String>, timeout: Duration) -> Result<Box<dyn EntityStore>> {
    if source.trim().is_empty() {
        return Err(Error::InvalidInput("empty data source".to_string()));
    }
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Box::new(HttpEntityStore::new(source, token, timeout)?))
    } else {
        Ok(Box::new(JsonFileStore::new(source)))
    }
}
