//! Configuration loading, env substitution, and validation.
//!
//! Config files: `huddle.toml`, `huddle.yaml`, `huddle.yml`, or `huddle.json`.
//! Searched in `./` then `~/.config/huddle/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config, parse_config},
    schema::{
        ChannelConfig, ChannelKind, ClickAction, DispatchConfig, FormatSection, FragmentConfig,
        HuddleConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
