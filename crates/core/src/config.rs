use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabaseConfig>,
    logging: Option<FileLoggingConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabaseConfig {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLoggingConfig {
    level: Option<String>,
    format: Option<LogFormat>,
}

const ENV_CONFIG_PATH: &str = "HRFLOW_CONFIG";
const ENV_DATABASE_URL: &str = "HRFLOW_DATABASE_URL";
const ENV_DB_MAX_CONNECTIONS: &str = "HRFLOW_DB_MAX_CONNECTIONS";
const ENV_DB_TIMEOUT_SECS: &str = "HRFLOW_DB_TIMEOUT_SECS";
const ENV_LOG_LEVEL: &str = "HRFLOW_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "HRFLOW_LOG_FORMAT";

impl AppConfig {
    /// Layered load: built-in defaults, then the TOML file, then process
    /// environment, then programmatic overrides. Validation runs last over
    /// the merged result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options
            .config_path
            .or_else(|| env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("hrflow.toml"));

        let file = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<FileConfig>(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
                FileConfig::default()
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        let file_database = file.database.unwrap_or_default();
        let file_logging = file.logging.unwrap_or_default();

        let database = DatabaseConfig {
            url: options
                .overrides
                .database_url
                .or_else(|| env::var(ENV_DATABASE_URL).ok())
                .or(file_database.url)
                .unwrap_or_else(|| "sqlite:hrflow.db".to_string()),
            max_connections: env_parsed(ENV_DB_MAX_CONNECTIONS)?
                .or(file_database.max_connections)
                .unwrap_or(5),
            timeout_secs: env_parsed(ENV_DB_TIMEOUT_SECS)?
                .or(file_database.timeout_secs)
                .unwrap_or(30),
        };

        let logging = LoggingConfig {
            level: options
                .overrides
                .log_level
                .or_else(|| env::var(ENV_LOG_LEVEL).ok())
                .or(file_logging.level)
                .unwrap_or_else(|| "info".to_string()),
            format: match options.overrides.log_format {
                Some(format) => format,
                None => env_log_format()?.or(file_logging.format).unwrap_or(LogFormat::Compact),
            },
        };

        let config = Self { database, logging };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::Validation(format!(
                "logging.level `{}` is not a valid tracing level",
                self.logging.level
            )));
        }
        Ok(())
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value }),
        Err(_) => Ok(None),
    }
}

fn env_log_format() -> Result<Option<LogFormat>, ConfigError> {
    match env::var(ENV_LOG_FORMAT) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "compact" => Ok(Some(LogFormat::Compact)),
            "pretty" => Ok(Some(LogFormat::Pretty)),
            "json" => Ok(Some(LogFormat::Json)),
            _ => Err(ConfigError::InvalidEnvOverride {
                key: ENV_LOG_FORMAT.to_string(),
                value,
            }),
        },
        Err(_) => Ok(None),
    }
}
