//! Process configuration read from the environment at startup.
//!
//! Every variable is checked before the server starts. All problems are
//! reported together and the binary exits if any are found.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::server::app::ApiSettings;

pub const DEFAULT_PAGE_LIMIT: u64 = 50;
pub const MAX_PAGE_LIMIT: u64 = 100;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
    Test,
}

impl AppEnv {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(AppEnv::Development),
            "production" | "prod" => Some(AppEnv::Production),
            "test" => Some(AppEnv::Test),
            _ => None,
        }
    }

    /// Best-effort read used before logging is configured.
    pub fn from_env_lossy() -> Self {
        env_value(|key| std::env::var(key).ok(), "APP_ENV")
            .or_else(|| env_value(|key| std::env::var(key).ok(), "NODE_ENV"))
            .and_then(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
            AppEnv::Test => "test",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variables: {}", describe(.0))]
    Invalid(BTreeMap<String, String>),
}

impl ConfigError {
    pub fn problems(&self) -> &BTreeMap<String, String> {
        match self {
            ConfigError::Invalid(problems) => problems,
        }
    }
}

fn describe(problems: &BTreeMap<String, String>) -> String {
    problems
        .iter()
        .map(|(key, message)| format!("{}: {}", key, message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origin: String,
    pub database_url: String,
    pub app_env: AppEnv,
    pub default_page_limit: u64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; used by `from_env`, CLI
    /// overrides and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = BTreeMap::new();

        let port = match env_value(&lookup, "PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port >= 1 => Some(port),
                _ => {
                    problems.insert(
                        "PORT".to_string(),
                        format!("expected an integer between 1 and 65535, got '{}'", raw),
                    );
                    None
                }
            },
            None => {
                problems.insert("PORT".to_string(), "is required".to_string());
                None
            }
        };

        let cors_origin = match env_value(&lookup, "CORS_ORIGIN") {
            Some(raw) => match parse_origin(&raw) {
                Ok(origin) => Some(origin),
                Err(message) => {
                    problems.insert("CORS_ORIGIN".to_string(), message);
                    None
                }
            },
            None => {
                problems.insert("CORS_ORIGIN".to_string(), "is required".to_string());
                None
            }
        };

        let database_url = env_value(&lookup, "DATABASE_URL");
        if database_url.is_none() {
            problems.insert("DATABASE_URL".to_string(), "is required".to_string());
        }

        let (env_key, env_raw) = match env_value(&lookup, "APP_ENV") {
            Some(raw) => ("APP_ENV", Some(raw)),
            None => ("NODE_ENV", env_value(&lookup, "NODE_ENV")),
        };
        let app_env = match env_raw {
            Some(raw) => AppEnv::parse(&raw).unwrap_or_else(|| {
                problems.insert(
                    env_key.to_string(),
                    format!(
                        "expected one of development, production, test, got '{}'",
                        raw
                    ),
                );
                AppEnv::default()
            }),
            None => AppEnv::default(),
        };

        let default_page_limit = match env_value(&lookup, "DEFAULT_PAGE_LIMIT") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => limit,
                _ => {
                    problems.insert(
                        "DEFAULT_PAGE_LIMIT".to_string(),
                        format!("expected an integer between 1 and {}, got '{}'", MAX_PAGE_LIMIT, raw),
                    );
                    DEFAULT_PAGE_LIMIT
                }
            },
            None => DEFAULT_PAGE_LIMIT,
        };

        let max_upload_bytes = match env_value(&lookup, "MAX_UPLOAD_BYTES") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => bytes,
                _ => {
                    problems.insert(
                        "MAX_UPLOAD_BYTES".to_string(),
                        format!("expected a positive integer, got '{}'", raw),
                    );
                    DEFAULT_MAX_UPLOAD_BYTES
                }
            },
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        match (port, cors_origin, database_url) {
            (Some(port), Some(cors_origin), Some(database_url)) if problems.is_empty() => Ok(Self {
                port,
                cors_origin,
                database_url,
                app_env,
                default_page_limit,
                max_upload_bytes,
            }),
            _ => Err(ConfigError::Invalid(problems)),
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            cors_origin: Some(self.cors_origin.clone()),
            default_page_limit: self.default_page_limit,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// `DATABASE_URL` on its own, for commands that only touch the database.
pub fn database_url_from_lookup<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env_value(lookup, "DATABASE_URL").ok_or_else(|| {
        let mut problems = BTreeMap::new();
        problems.insert("DATABASE_URL".to_string(), "is required".to_string());
        ConfigError::Invalid(problems)
    })
}

fn env_value<F>(lookup: F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Normalise an origin URL to the form browsers send in the `Origin` header.
fn parse_origin(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("expected a URL, got '{}' ({})", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url.origin().ascii_serialization()),
        scheme => Err(format!("expected an http(s) URL, got scheme '{}'", scheme)),
    }
}
