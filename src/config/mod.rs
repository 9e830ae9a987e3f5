//! Configuration for Sextant.
//!
//! Settings live in KDL files:
//!
//! - System: `~/.config/sextant/config.kdl` (or `$SX_CONFIG_DIR/config.kdl`)
//! - Project: `./sextant.kdl`, or the path given with `--config`
//!
//! Keys:
//! - `insight-endpoint` - URL of the remote insight generator
//! - `api-token` - Bearer token for the dashboard API
//! - `debounce-ms` - Quiet period before automatic insight requests (default 3500)
//! - `request-timeout-secs` - Timeout for remote calls (default 30)
//! - `output-format` - "json" or "human"
//! - `data-file` - Entity snapshot path or API base URL
//!
//! ## Precedence
//!
//! CLI flag > env var > project file > system file > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    API_TOKEN_ENV, CONFIG_DIR_ENV, ConfigOverrides, ConfigPaths, DATA_ENV, INSIGHT_ENDPOINT_ENV,
    Resolved, ResolvedConfig, ValueSource, resolve_config, resolve_config_with_env,
};
pub use schema::{OutputFormat, SextantConfig};
