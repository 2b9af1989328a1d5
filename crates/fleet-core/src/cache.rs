use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Anything that can drop its cached reads after a write.
///
/// The orchestrator calls [`ReadCache::invalidate_all`] after every mutating
/// action so downstream readers see fresh tracker state.
pub trait ReadCache: Send + Sync {
    fn invalidate_all(&self);
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Bounded in-memory cache whose entries expire after a fixed TTL.
pub struct TtlCache<V> {
    ttl: Duration,
    inner: Mutex<LruCache<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Return a live entry, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match inner.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.pop(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.put(
            key.into(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pop(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send> ReadCache for TtlCache<V> {
    fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.clear();
        tracing::debug!("read cache invalidated");
    }
}
