// Configuration loading and parsing (config/predictor.toml).
//
// The file is optional. Every key has a default so a bare checkout trains
// from `data/processed/df_master.csv` and serves `models/model.json`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::features::TARGET_COLUMN;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// predictor.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub training: TrainingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Historical player-season join used for training.
    pub dataset: String,
    /// Where the trained artifact is written and read.
    pub model: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: "data/processed/df_master.csv".into(),
            model: "models/model.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub seed: u64,
    pub cv_folds: usize,
    pub target: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            seed: 42,
            cv_folds: 5,
            target: TARGET_COLUMN.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/predictor.toml` relative to `base_dir`.
/// A missing file yields the defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("predictor.toml");
    let config = if path.exists() {
        let text = read_file(&path)?;
        parse_config(&text, &path)?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let string_fields: &[(&str, &str)] = &[
        ("paths.dataset", config.paths.dataset.as_str()),
        ("paths.model", config.paths.model.as_str()),
        ("training.target", config.training.target.as_str()),
        ("server.host", config.server.host.as_str()),
    ];
    for (name, val) in string_fields {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if config.training.n_estimators == 0 {
        return Err(ConfigError::ValidationError {
            field: "training.n_estimators".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.training.cv_folds < 2 {
        return Err(ConfigError::ValidationError {
            field: "training.cv_folds".into(),
            message: format!("must be at least 2, got {}", config.training.cv_folds),
        });
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
