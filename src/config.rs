use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// How long a submission may wait on a contended player row before
    /// failing with a retryable error.
    pub lock_timeout_ms: u64,
    pub top_cache_capacity: usize,
    pub top_cache_ttl_secs: u64,
    pub rank_cache_capacity: usize,
    pub rank_cache_ttl_secs: u64,
    pub submit_limit: u32,
    pub top_limit: u32,
    pub rank_limit: u32,
    pub rate_window_secs: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "8000"),
            lock_timeout_ms: try_load("ROW_LOCK_TIMEOUT_MS", "2000"),
            top_cache_capacity: try_load("TOP_CACHE_CAPACITY", "1024"),
            top_cache_ttl_secs: try_load("TOP_CACHE_TTL_SECS", "300"),
            rank_cache_capacity: try_load("RANK_CACHE_CAPACITY", "2048"),
            rank_cache_ttl_secs: try_load("RANK_CACHE_TTL_SECS", "60"),
            submit_limit: try_load("SUBMIT_RATE_LIMIT", "10"),
            top_limit: try_load("TOP_RATE_LIMIT", "120"),
            rank_limit: try_load("RANK_RATE_LIMIT", "60"),
            rate_window_secs: try_load("RATE_WINDOW_SECS", "60"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
