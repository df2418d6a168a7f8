use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// `None` keeps the server up but renders the setup screen.
    pub pocketbase_url: Option<String>,
    pub server: ServerConfig,
    pub session_file: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pocketbase_url: None,
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            session_file: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let pocketbase_url = get("POCKETBASE_URL")
            .or_else(|| get("VITE_POCKETBASE_URL"))
            .map(|url| url.trim_end_matches('/').to_string());

        let port = match get("NORTHLEAD_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("NORTHLEAD_PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            pocketbase_url,
            server: ServerConfig {
                host: get("NORTHLEAD_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
            },
            session_file: get("NORTHLEAD_SESSION_FILE").map(PathBuf::from),
            cache_ttl: seconds(&get, "NORTHLEAD_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            request_timeout: seconds(
                &get,
                "NORTHLEAD_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }
}

/// Loads `.env` from the working directory into the environment. A missing
/// file is normal; any other failure is handed back so it can be logged once
/// the logger is up.
pub fn load_env_file() -> Option<dotenvy::Error> {
    env_file_error(dotenvy::dotenv())
}

fn env_file_error<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(e),
    }
}

fn seconds(get: &dyn Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match get(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}
