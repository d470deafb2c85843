use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window rate limiter keyed by client identity. Constructed once in
/// `main` and carried in `AppState`; there is no ambient module-level state.
pub struct RateLimiter {
    max_hits: u32,
    window: Duration,
    hits: Mutex<HashMap<String, (Instant, u32)>>,
}

impl RateLimiter {
    pub fn new(max_hits: u32, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Expired windows are dropped wholesale so the map stays bounded by
        // the clients active within one window.
        hits.retain(|_, (start, _)| now.saturating_duration_since(*start) < self.window);
        let slot = hits.entry(key.to_string()).or_insert((now, 0));
        if slot.1 >= self.max_hits {
            return false;
        }
        slot.1 += 1;
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}
