//! Shared cache abstraction
//!
//! Credential state is shared across host processes through an external
//! cache (Redis, memcached, the host framework's store). The [`SharedCache`]
//! trait keeps that backend out of this workspace; [`MemoryCache`] covers
//! tests and single-process deployments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::time::{Clock, SystemClock};

/// String key-value store with per-entry TTL semantics.
///
/// Implementations must be safe to share across tasks. An entry written with
/// a TTL must stop being returned once the TTL elapses; concurrent writers
/// resolve last-write-wins.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Read an entry. Returns `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write an entry. A `ttl` of `None` keeps it until overwritten or
    /// deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    /// Remove an entry if present.
    async fn delete(&self, key: &str);
}

/// Entry stored in the cache with its expiry deadline
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process [`SharedCache`] implementation with lazy TTL eviction
///
/// Expired entries are dropped on the read path rather than by a background
/// sweeper. The clock is injectable so expiry behavior can be tested with
/// [`crate::time::MockClock`].
#[derive(Debug, Clone)]
pub struct MemoryCache<C = SystemClock>
where
    C: Clock,
{
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    clock: C,
}

impl MemoryCache<SystemClock> {
    /// Create an empty cache backed by the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MemoryCache<C>
where
    C: Clock,
{
    /// Create an empty cache with a custom clock (useful for testing)
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), clock }
    }

    /// Number of live (unexpired) entries
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.read().values().filter(|entry| !entry.is_expired(now)).count()
    }

    /// Whether the cache holds no live entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<C> SharedCache for MemoryCache<C>
where
    C: Clock,
{
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired(self.clock.now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        let entry = CacheEntry { value: value.to_owned(), expires_at };
        self.entries.write().insert(key.to_owned(), entry);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }
}
