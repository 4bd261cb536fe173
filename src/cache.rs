//! # Read caches
//!
//! Bounded, time-expiring key-value stores sitting in front of the score
//! store. Rank queries are read-heavy and tolerate brief staleness, so we
//! trade exactness between recomputations for read throughput.
//!
//! ## Policy
//!
//! - Fixed capacity, oldest-inserted entry evicted first when full
//! - Per-entry TTL, expired entries dropped on access
//! - `invalidate`/`invalidate_all` remove entries immediately, independent
//!   of TTL
//!
//! Caches live on [`crate::state::State`] and are passed by injection, so
//! tests can construct isolated instances.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    hash::Hash,
    sync::Mutex,
    time::{Duration, Instant},
};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    // Insertion order of the live keys; kept in lockstep with the map so
    // the front is always the oldest live entry.
    order: VecDeque<K>,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    fn remove(&mut self, key: &K) {
        if self.map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        match inner.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                inner.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();

        let fresh = !inner.map.contains_key(&key);
        if fresh {
            while inner.map.len() >= self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.map.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(key.clone());
        }

        inner.map.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.lock().unwrap().remove(key);
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.map.clear();
        inner.order.clear();
    }

    /// Serve the cached value when present and unexpired, otherwise run
    /// `compute`, store its result, and return it. Errors from `compute`
    /// are never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
