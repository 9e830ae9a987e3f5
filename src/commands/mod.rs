//! Command implementations for the Sextant CLI.
//!
//! Each command returns a result struct that implements [`Output`], so `main`
//! can print it as JSON or as human-readable text:
//! - `facets` - reconcile, options and view
//! - `insights` - one-shot insight requests and the `watch` loop
//! - `config` - resolved configuration display

mod config;
mod facets;
mod insights;

pub use config::{ConfigShowResult, config_show};
pub use facets::{OptionsResult, ReconcileResult, ViewResult, options, reconcile, view};
pub use insights::{InsightsResult, WatchEvent, WatchInput, generator_for, insights, watch};

use crate::config::ResolvedConfig;
use crate::controller::InsightsController;
use crate::models::{Facet, Selection};
use crate::store::{LoadState, store_for};
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Build a controller from the configured data source and apply `draft`.
///
/// The data source is required; a source that fails to load is not an error
/// and shows up as `LoadState::Unavailable` instead.
pub async fn load_controller(config: &ResolvedConfig, draft: Selection) -> Result<InsightsController> {
    let source = config.data_file().ok_or_else(|| {
        Error::InvalidInput(
            "no entity data source: pass --data, set SX_DATA or data-file in sextant.kdl".to_string(),
        )
    })?;
    let store = store_for(
        source,
        config.api_token().map(str::to_string),
        config.request_timeout(),
    )?;

    let mut controller = InsightsController::new();
    controller.load(store.as_ref()).await;
    controller.replace(draft)?;
    Ok(controller)
}

/// One line warning about a failed load, for human output.
fn load_warning(state: &LoadState) -> Option<String> {
    match state {
        LoadState::Unavailable(reason) => Some(format!("Warning: entities unavailable ({})", reason)),
        _ => None,
    }
}

fn format_ids(ids: &std::collections::BTreeSet<String>) -> String {
    if ids.is_empty() {
        "(all)".to_string()
    } else {
        ids.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Three-line rendering of a selection.
fn format_selection(selection: &Selection) -> Vec<String> {
    [(Facet::Group, "groups:  "), (Facet::Project, "projects:"), (Facet::User, "users:   ")]
        .into_iter()
        .map(|(facet, label)| format!("  {} {}", label, format_ids(selection.facet(facet))))
        .collect()
}

fn to_json_string<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
}
