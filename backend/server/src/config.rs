use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, anyhow};
use tracing::{info, warn};

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost,http://localhost:8000,http://localhost:8081,http://localhost:3000,http://localhost:3001,http://140.113.160.136:419,http://140.113.160.136";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}', expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub music_path: PathBuf,
    /// Snapshots kept per user and collection, `0` keeps everything.
    pub retention_cap: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub seed_users: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            store_backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            music_path: PathBuf::from("/music"),
            retention_cap: 5,
            max_upload_bytes: 50 * 1024 * 1024,
            cors_origins: parse_list(DEFAULT_CORS_ORIGINS),
            seed_users: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, anyhow::Error> {
        Ok(Self {
            port: try_load("RUST_PORT", "8000")?,
            store_backend: try_load("STORE_BACKEND", "redis")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            music_path: try_load("MUSIC_FILE_PATH", "/music")?,
            retention_cap: try_load("RETENTION_CAP", "5")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "52428800")?,
            cors_origins: parse_origins(&try_load::<String>("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)?)?,
            seed_users: parse_seed_users(&try_load::<String>("SEED_USERS", "")?)?,
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, anyhow::Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}

pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Credentials are allowed cross-origin, so every origin must be explicit.
pub fn parse_origins(value: &str) -> Result<Vec<String>, anyhow::Error> {
    let origins = parse_list(value);

    if origins.iter().any(|origin| origin == "*") {
        return Err(anyhow!("CORS_ORIGINS cannot contain '*', list each origin"));
    }

    Ok(origins)
}

/// Parses `user:password,user:password`.
pub fn parse_seed_users(value: &str) -> Result<Vec<(String, String)>, anyhow::Error> {
    parse_list(value)
        .into_iter()
        .map(|pair| {
            let (username, password) = pair
                .split_once(':')
                .with_context(|| format!("SEED_USERS entry '{pair}' is missing ':'"))?;

            if username.is_empty() {
                return Err(anyhow!("SEED_USERS entry '{pair}' has an empty username"));
            }

            Ok((username.to_string(), password.to_string()))
        })
        .collect()
}
