//! Configuration module for relmap.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, PaginationSettings, SchemaSettings, Settings, SettingsError,
};
