//! Configuration loading, env substitution, and environment overrides.
//!
//! Config files: `botwire.toml`, `botwire.yaml`, or `botwire.json`
//! Searched in `./` then the user config dir.
//!
//! Supports `${ENV_VAR}` substitution in the raw file text. The `EVENTHUB_*`
//! deployment variables override file values afterwards.

pub mod env;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    env::{apply_env_overrides, apply_env_overrides_with},
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        BotwireConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_SERVICE_DOMAIN, DirectLineConfig,
        EventHubConfig, MetricsConfig,
    },
};
