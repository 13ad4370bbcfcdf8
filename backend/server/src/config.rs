use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Invalid {key} value: {message}")]
pub struct ConfigError {
    key: String,
    message: String,
}

pub struct Config {
    pub port: u16,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let page_size = try_load("PAGE_SIZE", "20")?;
        if page_size == 0 {
            return Err(ConfigError {
                key: "PAGE_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port: try_load("SERVER_PORT", "8080")?,
            redis_host: try_load("REDIS_HOST", "localhost")?,
            redis_port: try_load("REDIS_PORT", "6379")?,
            redis_password: var("REDIS_PASSWORD")
                .ok()
                .or_else(|| read_secret("REDIS_PASSWORD")),
            page_size,
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_value(key, var(key).ok(), default)
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
    .parse()
    .map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

/// Optional: a missing secret file means the store runs without auth.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret at {path}: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
