use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://admissions.db";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_MAX_SCAN_SIZE_MB: u64 = 20;
const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load environment file {path}: {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenvy::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

pub fn load_environment() -> Result<(), ConfigError> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), ConfigError> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_string(),
        source,
    })?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub media_root: PathBuf,
    pub max_scan_size_mb: u64,
    pub page_size: u32,
    pub honeycomb_api_key: Option<String>,
    pub otlp_endpoint: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_scan_size_mb = parse_var("MAX_SCAN_SIZE_MB", defaults.max_scan_size_mb)?;
        let page_size = parse_var("PAGE_SIZE", defaults.page_size)?;

        if max_scan_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SCAN_SIZE_MB",
                value: max_scan_size_mb.to_string(),
            });
        }
        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "PAGE_SIZE",
                value: page_size.to_string(),
            });
        }

        Ok(Self {
            database_url: optional_var("DATABASE_URL").unwrap_or(defaults.database_url),
            media_root: optional_var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            max_scan_size_mb,
            page_size,
            honeycomb_api_key: optional_var("HONEYCOMB_API_KEY"),
            otlp_endpoint: optional_var("OTLP_ENDPOINT"),
        })
    }

    pub fn max_scan_size_bytes(&self) -> u64 {
        self.max_scan_size_mb * 1024 * 1024
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            media_root: DEFAULT_MEDIA_ROOT.into(),
            max_scan_size_mb: DEFAULT_MAX_SCAN_SIZE_MB,
            page_size: DEFAULT_PAGE_SIZE,
            honeycomb_api_key: None,
            otlp_endpoint: None,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    dotenvy::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
