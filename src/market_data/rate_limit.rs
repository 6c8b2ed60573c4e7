//! Per-provider request ceilings over a rolling window.
//!
//! A refused acquire means the ceiling is reached inside the current
//! window; the caller fails fast without a network round-trip.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::market_data::market_data_constants::{DEFAULT_RATE_CEILING, DEFAULT_RATE_WINDOW_SECS};

/// Sliding request count for one provider.
#[derive(Debug)]
pub struct RateWindow {
    started: Instant,
    count: u32,
    ceiling: u32,
    window: Duration,
}

impl RateWindow {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            started: Instant::now(),
            count: 0,
            ceiling,
            window,
        }
    }

    /// Count one outbound call, or refuse if the ceiling is reached.
    /// The window resets once it has elapsed.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if now.duration_since(self.started) >= self.window {
            self.started = now;
            self.count = 0;
        }
        if self.count >= self.ceiling {
            return false;
        }
        self.count += 1;
        true
    }
}

/// Usage snapshot for one provider's window, for diagnostics display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindowStats {
    pub provider: String,
    pub used: u32,
    pub ceiling: u32,
    pub window_secs: u64,
    pub resets_in_secs: u64,
}

/// All provider windows, keyed by provider id.
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    ceilings: HashMap<String, u32>,
    default_ceiling: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            ceilings: HashMap::new(),
            default_ceiling: DEFAULT_RATE_CEILING,
            window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_default_ceiling(mut self, ceiling: u32) -> Self {
        self.default_ceiling = ceiling;
        self
    }

    /// Override the ceiling for one provider.
    pub fn with_ceiling(mut self, provider: &str, ceiling: u32) -> Self {
        self.ceilings.insert(provider.to_string(), ceiling);
        self
    }

    /// Count one outbound call for `provider`, or refuse locally.
    pub fn try_acquire(&self, provider: &str) -> bool {
        self.try_acquire_at(provider, Instant::now())
    }

    pub fn try_acquire_at(&self, provider: &str, now: Instant) -> bool {
        let ceiling = self
            .ceilings
            .get(provider)
            .copied()
            .unwrap_or(self.default_ceiling);
        let mut window = self
            .windows
            .entry(provider.to_string())
            .or_insert_with(|| RateWindow::new(ceiling, self.window));
        window.try_acquire_at(now)
    }

    pub fn stats(&self) -> Vec<RateWindowStats> {
        let now = Instant::now();
        let mut stats: Vec<RateWindowStats> = self
            .windows
            .iter()
            .map(|entry| {
                let w = entry.value();
                let elapsed = now.duration_since(w.started);
                RateWindowStats {
                    provider: entry.key().clone(),
                    used: w.count,
                    ceiling: w.ceiling,
                    window_secs: w.window.as_secs(),
                    resets_in_secs: w.window.saturating_sub(elapsed).as_secs(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));
        stats
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_refuses_fourth_call() {
        let limiter = RateLimiter::new().with_ceiling("A", 3);
        let now = Instant::now();

        assert!(limiter.try_acquire_at("A", now));
        assert!(limiter.try_acquire_at("A", now));
        assert!(limiter.try_acquire_at("A", now));
        assert!(!limiter.try_acquire_at("A", now));
    }

    #[test]
    fn test_window_reset_allows_new_calls() {
        let limiter = RateLimiter::new()
            .with_window(Duration::from_secs(60))
            .with_ceiling("A", 1);
        let now = Instant::now();

        assert!(limiter.try_acquire_at("A", now));
        assert!(!limiter.try_acquire_at("A", now + Duration::from_secs(30)));
        assert!(limiter.try_acquire_at("A", now + Duration::from_secs(61)));
    }

    #[test]
    fn test_providers_are_independent() {
        let limiter = RateLimiter::new().with_ceiling("A", 1).with_ceiling("B", 1);
        let now = Instant::now();

        assert!(limiter.try_acquire_at("A", now));
        assert!(!limiter.try_acquire_at("A", now));
        assert!(limiter.try_acquire_at("B", now));
    }

    #[test]
    fn test_stats_report_usage() {
        let limiter = RateLimiter::new().with_ceiling("A", 5);
        let now = Instant::now();
        limiter.try_acquire_at("A", now);
        limiter.try_acquire_at("A", now);

        let stats = limiter.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].provider, "A");
        assert_eq!(stats[0].used, 2);
        assert_eq!(stats[0].ceiling, 5);
    }
}
