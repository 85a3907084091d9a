//! Deduplicated user notices.
//!
//! Many queries can hit the same condition at once (a rate limit, typically).
//! The gate lets one notice per key through per window.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub const RATE_LIMIT_NOTICE: &str = "rate_limit";

#[derive(Debug)]
pub struct NoticeGate {
    window: Duration,
    last_shown: HashMap<String, Instant>,
}

impl NoticeGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: HashMap::new(),
        }
    }

    /// Whether a notice with `key` should be shown now. Records the showing.
    pub fn admit(&mut self, key: &str) -> bool {
        let now = Instant::now();
        match self.last_shown.get(key) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_shown.insert(key.to_string(), now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeated_key_is_suppressed_within_window() {
        let mut gate = NoticeGate::new(Duration::from_secs(10));
        assert!(gate.admit(RATE_LIMIT_NOTICE));
        assert!(!gate.admit(RATE_LIMIT_NOTICE));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!gate.admit(RATE_LIMIT_NOTICE));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(gate.admit(RATE_LIMIT_NOTICE));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let mut gate = NoticeGate::new(Duration::from_secs(10));
        assert!(gate.admit("a"));
        assert!(gate.admit("b"));
        assert!(!gate.admit("a"));
    }
}
