//! Runtime configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first when present.
//! Command-line flags override whatever is loaded here.
//!
//! ## Variables
//!
//! - `NEDRA_API_URL` - Base URL of the licensing API (default: `https://map.choices.kz`)
//! - `NEDRA_DATASET` - Deposit dataset JSON (default: `data/excel-data.json`)
//! - `NEDRA_REGION_STATS` - Region stats lookup table JSON (optional)
//! - `NEDRA_CACHE_PATH` - Info response cache (default: `~/.nedra/info-cache.json`)
//! - `NEDRA_CACHE_TTL_DAYS` - Cache entry lifetime (default: 7)
//! - `NEDRA_FETCH_CONCURRENCY` - Parallel `info.php` requests (default: 4, min: 1)
//! - `NEDRA_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `NEDRA_OFFLINE` - `true`/`1` to use cached responses only
//! - `LISTEN` - Bind address for `serve` (default: `127.0.0.1:8080`)
//! - `RUST_LOG` - Log filter (default: `info`)
//! - `LOG_FORMAT` - `text` or `json` (default: `text`)

use crate::api::{InfoCache, DEFAULT_FETCH_CONCURRENCY};
use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://map.choices.kz";
pub const DEFAULT_DATASET: &str = "data/excel-data.json";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub dataset_path: PathBuf,
    pub region_stats_path: Option<PathBuf>,
    pub cache_path: PathBuf,
    pub cache_ttl_days: u32,
    pub fetch_concurrency: usize,
    pub http_timeout_secs: u64,
    pub offline: bool,
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            dataset_path: PathBuf::from(DEFAULT_DATASET),
            region_stats_path: None,
            cache_path: InfoCache::default_path(),
            cache_ttl_days: 7,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            http_timeout_secs: 15,
            offline: false,
            listen_addr: DEFAULT_LISTEN.to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable is set but unparseable, or if
    /// `LOG_FORMAT` names an unknown format.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fetch_concurrency = parse_or(get("NEDRA_FETCH_CONCURRENCY"), "NEDRA_FETCH_CONCURRENCY", defaults.fetch_concurrency)?;
        let log_format = get("LOG_FORMAT").unwrap_or(defaults.log_format);
        if log_format != "text" && log_format != "json" {
            bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", log_format);
        }

        Ok(Self {
            api_base_url: get("NEDRA_API_URL").unwrap_or(defaults.api_base_url),
            dataset_path: get("NEDRA_DATASET").map(PathBuf::from).unwrap_or(defaults.dataset_path),
            region_stats_path: get("NEDRA_REGION_STATS").map(PathBuf::from),
            cache_path: get("NEDRA_CACHE_PATH").map(PathBuf::from).unwrap_or(defaults.cache_path),
            cache_ttl_days: parse_or(get("NEDRA_CACHE_TTL_DAYS"), "NEDRA_CACHE_TTL_DAYS", defaults.cache_ttl_days)?,
            fetch_concurrency: fetch_concurrency.max(1),
            http_timeout_secs: parse_or(get("NEDRA_HTTP_TIMEOUT_SECS"), "NEDRA_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            offline: get("NEDRA_OFFLINE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.offline),
            listen_addr: get("LISTEN").unwrap_or(defaults.listen_addr),
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => match v.parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => bail!("{} must be a number, got '{}'", key, v),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET));
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.cache_ttl_days, 7);
        assert!(!config.offline);
        assert!(config.region_stats_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("NEDRA_API_URL", "http://localhost:9000"),
            ("NEDRA_FETCH_CONCURRENCY", "0"),
            ("NEDRA_OFFLINE", "TRUE"),
            ("NEDRA_REGION_STATS", "data/regions.json"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.fetch_concurrency, 1);
        assert!(config.offline);
        assert_eq!(config.region_stats_path, Some(PathBuf::from("data/regions.json")));
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("NEDRA_CACHE_TTL_DAYS", "week")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
