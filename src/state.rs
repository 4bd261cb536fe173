use std::{sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    cache::TtlCache,
    config::Config,
    models::{LeaderboardPage, PlayerId, PlayerRank},
    rate_limit::RateLimiter,
    store::Store,
};

pub struct State {
    pub config: Config,
    pub store: Store,
    /// Key is (limit, page); one entry per distinct listing request shape.
    pub top_cache: TtlCache<(u32, u32), LeaderboardPage>,
    pub rank_cache: TtlCache<PlayerId, PlayerRank>,
    pub submit_limiter: RateLimiter,
    pub top_limiter: RateLimiter,
    pub rank_limiter: RateLimiter,
    /// Serializes full rank recomputations. Scoped to that critical
    /// section only; submissions and reads never take it.
    pub recompute_lock: Mutex<()>,
}

impl State {
    pub fn new(config: Config) -> Arc<Self> {
        let window = Duration::from_secs(config.rate_window_secs);

        Arc::new(Self {
            store: Store::new(Duration::from_millis(config.lock_timeout_ms)),
            top_cache: TtlCache::new(
                config.top_cache_capacity,
                Duration::from_secs(config.top_cache_ttl_secs),
            ),
            rank_cache: TtlCache::new(
                config.rank_cache_capacity,
                Duration::from_secs(config.rank_cache_ttl_secs),
            ),
            submit_limiter: RateLimiter::new(config.submit_limit, window),
            top_limiter: RateLimiter::new(config.top_limit, window),
            rank_limiter: RateLimiter::new(config.rank_limit, window),
            recompute_lock: Mutex::new(()),
            config,
        })
    }
}
