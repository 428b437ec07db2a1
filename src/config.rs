use crate::constants::*;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub selector: SelectorConfig,
}

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// CSV document listing the known servers
    pub server_list_url: String,

    /// Days after which the cached server list is downloaded again
    pub expiration_days: i64,

    /// Timeout for the server list download
    pub fetch_timeout_secs: u64,

    /// Timeout for checking that a custom server answers
    pub reachability_timeout_secs: u64,
}

impl SelectorConfig {
    pub fn new(server_list_url: impl Into<String>) -> Self {
        Self {
            server_list_url: server_list_url.into(),
            expiration_days: DEFAULT_EXPIRATION_DAYS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECONDS,
            reachability_timeout_secs: DEFAULT_REACHABILITY_TIMEOUT_SECONDS,
        }
    }

    pub fn from_env() -> Result<Self, String> {
        let server_list_url =
            env::var("SERVER_LIST_URL").map_err(|_| "SERVER_LIST_URL must be set")?;

        let expiration_days: i64 = env::var("SERVER_LIST_EXPIRATION_DAYS")
            .unwrap_or_else(|_| DEFAULT_EXPIRATION_DAYS.to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_LIST_EXPIRATION_DAYS")?;

        if expiration_days < 1 {
            return Err("SERVER_LIST_EXPIRATION_DAYS must be at least 1".to_string());
        }

        Ok(Self {
            server_list_url,
            expiration_days,
            fetch_timeout_secs: env::var("SERVER_LIST_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_FETCH_TIMEOUT_SECONDS.to_string())
                .parse()
                .map_err(|_| "Invalid SERVER_LIST_FETCH_TIMEOUT_SECS")?,
            reachability_timeout_secs: env::var("SERVER_CHECK_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_REACHABILITY_TIMEOUT_SECONDS.to_string())
                .parse()
                .map_err(|_| "Invalid SERVER_CHECK_TIMEOUT_SECS")?,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            selector: SelectorConfig::from_env()?,
        })
    }
}
