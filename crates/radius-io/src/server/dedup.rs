//! Time-windowed duplicate detection with response replay.
//!
//! RADIUS clients retransmit on timeout without changing the identifier or
//! authenticator. Keying on `(identifier, remote address, authenticator)`
//! lets retransmits of one request be absorbed while a genuinely new
//! request that happens to reuse an identifier (fresh authenticator)
//! misses the cache.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::debug;

/// Cache key: one request as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub identifier: u8,
    pub remote: SocketAddr,
    pub authenticator: [u8; 16],
}

impl RequestKey {
    pub fn new(identifier: u8, remote: SocketAddr, authenticator: [u8; 16]) -> Self {
        RequestKey {
            identifier,
            remote,
            authenticator,
        }
    }
}

#[derive(Debug, Clone)]
enum CacheState {
    /// Handler still running; retransmits are absorbed silently.
    Pending,
    /// Encoded response bytes, replayed verbatim on retransmit.
    Done(Vec<u8>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    state: CacheState,
    inserted_at: Instant,
}

/// What ingress should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressDecision {
    /// First sighting; run the handler.
    New,
    /// Same request is already being handled; drop this copy.
    InFlight,
    /// Already answered inside the window; resend these bytes.
    Replay(Vec<u8>),
}

/// Bounded response cache with TTL eviction.
///
/// A background task sweeps expired entries at `ttl / 4`; ingress also
/// purges lazily whatever it touches, so correctness never depends on the
/// sweeper having run.
pub struct ResponseCache {
    entries: Arc<DashMap<RequestKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    sweeper_running: Arc<AtomicBool>,
}

impl ResponseCache {
    /// Default window per RFC client retransmit behavior.
    pub const DEFAULT_TTL: Duration = Duration::from_millis(30_000);

    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::new_internal(ttl, max_entries, true)
    }

    /// No background sweeper; lazy purging still applies.
    #[cfg(test)]
    pub(crate) fn new_unswept(ttl: Duration, max_entries: usize) -> Self {
        Self::new_internal(ttl, max_entries, false)
    }

    fn new_internal(ttl: Duration, max_entries: usize, start_sweeper: bool) -> Self {
        let entries: Arc<DashMap<RequestKey, CacheEntry>> = Arc::new(DashMap::new());
        let sweeper_running = Arc::new(AtomicBool::new(start_sweeper));

        if start_sweeper {
            let entries = Arc::clone(&entries);
            let running = Arc::clone(&sweeper_running);
            let interval = (ttl / 4).max(Duration::from_millis(10));

            tokio::spawn(async move {
                let mut ticker = time::interval(interval);
                ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

                while running.load(Ordering::Relaxed) {
                    ticker.tick().await;

                    let now = Instant::now();
                    let expired: Vec<RequestKey> = entries
                        .iter()
                        .filter(|entry| now.duration_since(entry.value().inserted_at) > ttl)
                        .map(|entry| entry.key().clone())
                        .collect();

                    let removed = expired.len();
                    for key in expired {
                        entries.remove(&key);
                    }
                    if removed > 0 {
                        debug!(removed, remaining = entries.len(), "response cache sweep");
                    }
                }
            });
        }

        ResponseCache {
            entries,
            ttl,
            max_entries,
            sweeper_running,
        }
    }

    /// Classify an inbound request, registering a pending entry on miss.
    pub fn check(&self, key: RequestKey) -> IngressDecision {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&key) {
            if now.duration_since(entry.inserted_at) <= self.ttl {
                return match &entry.state {
                    CacheState::Pending => IngressDecision::InFlight,
                    CacheState::Done(bytes) => IngressDecision::Replay(bytes.clone()),
                };
            }
            // past the window: fall through and treat as new
        }

        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        self.entries.insert(
            key,
            CacheEntry {
                state: CacheState::Pending,
                inserted_at: now,
            },
        );
        IngressDecision::New
    }

    /// Record the response bytes for an answered request.
    pub fn store(&self, key: RequestKey, response: Vec<u8>) {
        self.entries.insert(
            key,
            CacheEntry {
                state: CacheState::Done(response),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Forget a request whose handler failed or produced no response, so a
    /// client retransmit gets a fresh run.
    pub fn forget(&self, key: &RequestKey) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        self.sweeper_running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(identifier: u8, auth: u8) -> RequestKey {
        RequestKey::new(
            identifier,
            "192.168.1.10:50000".parse().unwrap(),
            [auth; 16],
        )
    }

    #[tokio::test]
    async fn test_replay_within_window() {
        let cache = ResponseCache::new_unswept(Duration::from_secs(30), 100);

        assert_eq!(cache.check(key(42, 1)), IngressDecision::New);
        cache.store(key(42, 1), vec![2, 42, 0, 20]);

        match cache.check(key(42, 1)) {
            IngressDecision::Replay(bytes) => assert_eq!(bytes, vec![2, 42, 0, 20]),
            other => panic!("expected replay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_in_flight_absorbed() {
        let cache = ResponseCache::new_unswept(Duration::from_secs(30), 100);
        assert_eq!(cache.check(key(7, 1)), IngressDecision::New);
        assert_eq!(cache.check(key(7, 1)), IngressDecision::InFlight);
    }

    #[tokio::test]
    async fn test_fresh_authenticator_misses() {
        let cache = ResponseCache::new_unswept(Duration::from_secs(30), 100);
        assert_eq!(cache.check(key(42, 1)), IngressDecision::New);
        cache.store(key(42, 1), vec![1]);
        // same identifier and address, new authenticator
        assert_eq!(cache.check(key(42, 2)), IngressDecision::New);
    }

    #[tokio::test]
    async fn test_lazy_expiry_without_sweeper() {
        let cache = ResponseCache::new_unswept(Duration::from_millis(20), 100);
        assert_eq!(cache.check(key(1, 1)), IngressDecision::New);
        cache.store(key(1, 1), vec![9]);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.check(key(1, 1)), IngressDecision::New);
    }

    #[tokio::test]
    async fn test_background_sweeper_evicts() {
        let cache = ResponseCache::new(Duration::from_millis(40), 100);
        assert_eq!(cache.check(key(1, 1)), IngressDecision::New);
        cache.store(key(1, 1), vec![9]);
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_forget_allows_rerun() {
        let cache = ResponseCache::new_unswept(Duration::from_secs(30), 100);
        assert_eq!(cache.check(key(3, 1)), IngressDecision::New);
        cache.forget(&key(3, 1));
        assert_eq!(cache.check(key(3, 1)), IngressDecision::New);
    }

    #[tokio::test]
    async fn test_bounded() {
        let cache = ResponseCache::new_unswept(Duration::from_secs(30), 2);
        assert_eq!(cache.check(key(1, 1)), IngressDecision::New);
        assert_eq!(cache.check(key(2, 1)), IngressDecision::New);
        assert_eq!(cache.check(key(3, 1)), IngressDecision::New);
        assert_eq!(cache.len(), 2);
    }
}
