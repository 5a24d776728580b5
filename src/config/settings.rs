//! TOML-based configuration for relmap.
//!
//! Supports a config file (relmap.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! dialect = "postgres"
//!
//! [pagination]
//! default_page_size = 20
//! max_page_size = 500
//!
//! [schema]
//! path = "${APP_DIR}/schema.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Default SQL dialect (postgres, mysql, sqlite, tsql).
    pub dialect: String,

    /// Page size bounds.
    pub pagination: PaginationSettings,

    /// Schema file location.
    pub schema: SchemaSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            pagination: PaginationSettings::default(),
            schema: SchemaSettings::default(),
        }
    }
}

/// Page size bounds for paged execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationSettings {
    /// Page size used when a request gives none.
    pub default_page_size: u64,

    /// Upper bound on any requested page size.
    pub max_page_size: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
        }
    }
}

/// Schema file settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Path to the TOML schema file (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `RELMAP_CONFIG`
    /// 2. `./relmap.toml`
    /// 3. `~/.config/relmap/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("RELMAP_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("relmap.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("relmap").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        self.dialect_type()?;
        if self.pagination.max_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "pagination.max_page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the dialect type.
    pub fn dialect_type(&self) -> Result<Dialect, SettingsError> {
        Dialect::from_str(&self.dialect)
            .map_err(|_| SettingsError::UnsupportedDialect(self.dialect.clone()))
    }

    /// Get the schema path with environment variables expanded.
    pub fn schema_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.schema
            .path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced && ch == '}' {
                chars.next();
                break;
            }
            if !braced && !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            var_name.push(ch);
            chars.next();
        }

        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
