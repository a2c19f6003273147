use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Advisory read-through TTL cache keyed by string. A cold cache must still
/// produce correct results; nothing may depend on a hit. TTL of zero
/// disables storage entirely.
pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if self.ttl.is_zero() {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: &str, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            // drop expired entries opportunistically so the map stays small
            let ttl = self.ttl;
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
            entries.insert(key.to_string(), (Instant::now(), value));
        }
    }
}
