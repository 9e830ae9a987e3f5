//! Sextant - facet consistency and insight scheduling for project dashboards.
//!
//! This library provides the core of the `sx` CLI tool: deriving a membership
//! graph from raw entity collections, reconciling group/project/user facet
//! selections into a consistent state, building filtered views with KPIs, and
//! scheduling debounced requests to a remote insight generator.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod facets;
pub mod insight;
pub mod logging;
pub mod models;
pub mod store;
pub mod view;


/// Library-level error type for Sextant operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Insight request failed: {0}")]
    Insight(#[from] insight::InsightError),

    #[error("Entities not loaded: the selection cannot be edited before the first load")]
    NotLoaded,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Sextant operations.
pub type Result<T> = std::result::Result<T, Error>;
