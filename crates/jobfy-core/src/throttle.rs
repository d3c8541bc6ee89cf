//! Per-site request throttling shared by every run in the process.
//!
//! Each site gets a [`SiteLimiter`] enforcing its [`RateLimitPolicy`]:
//! at most `max_concurrent` requests in flight, and request starts spaced
//! by at least `min_interval`. Limiters for different sites share no
//! state, so a slow site never delays another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;
use crate::registry::AdapterRegistry;
use crate::site::RateLimitPolicy;

/// Limiter for a single site.
#[derive(Debug)]
pub struct SiteLimiter {
    site_id: String,
    policy: RateLimitPolicy,
    slots: Arc<Semaphore>,
    /// Earliest instant the next request may start.
    next_start: Mutex<Option<Instant>>,
}

/// Held while a request to the site is in flight. Dropping it frees the slot,
/// including when the owning task is cancelled.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl SiteLimiter {
    pub fn new(site_id: &str, policy: RateLimitPolicy) -> Self {
        Self {
            site_id: site_id.to_string(),
            policy,
            slots: Arc::new(Semaphore::new(policy.max_concurrent.max(1))),
            next_start: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Requests currently allowed to start without waiting for a slot.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a free slot and for the minimum interval to elapse.
    pub async fn acquire(&self) -> Result<SlotGuard, AppError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Generic(format!("limiter for '{}' closed", self.site_id)))?;

        let wait = self.reserve_start().await;
        if !wait.is_zero() {
            tracing::debug!(
                site = %self.site_id,
                sleep_ms = %wait.as_millis(),
                "Throttling request"
            );
            tokio::time::sleep(wait).await;
        }

        Ok(SlotGuard { _permit: permit })
    }

    /// Claim the next start time and return how long to wait for it.
    ///
    /// The reservation is taken under the lock and the sleep happens after
    /// releasing it, so concurrent holders of different slots stay spaced.
    async fn reserve_start(&self) -> Duration {
        let mut next = self.next_start.lock().await;
        let now = Instant::now();
        let start = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(start + self.policy.min_interval);
        start - now
    }
}

/// The set of per-site limiters, built once from the registry.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    sites: HashMap<String, Arc<SiteLimiter>>,
}

impl RateLimiter {
    pub fn from_registry(registry: &AdapterRegistry) -> Self {
        let sites = registry
            .list()
            .into_iter()
            .map(|d| {
                let limiter = Arc::new(SiteLimiter::new(&d.id, d.rate_limit));
                (d.id, limiter)
            })
            .collect();
        Self { sites }
    }

    /// The limiter for one site. Tasks hold only their own site's limiter.
    pub fn for_site(&self, site_id: &str) -> Result<Arc<SiteLimiter>, AppError> {
        self.sites
            .get(site_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("no rate limiter for site '{site_id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubAdapter;

    #[tokio::test]
    async fn enforces_min_interval_between_starts() {
        let limiter = SiteLimiter::new("a", RateLimitPolicy::new(4, Duration::from_millis(80)));

        let start = Instant::now();
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        drop(limiter.acquire().await.unwrap());
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(160),
            "three starts should span two intervals, elapsed: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn caps_in_flight_requests() {
        let limiter = Arc::new(SiteLimiter::new("a", RateLimitPolicy::new(2, Duration::ZERO)));

        let first = limiter.acquire().await.unwrap();
        let _second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_slots(), 0);

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished(), "third request must wait for a slot");

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("slot should be released")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_slot() {
        let limiter = Arc::new(SiteLimiter::new("a", RateLimitPolicy::new(1, Duration::ZERO)));
        let held = limiter.acquire().await.unwrap();

        let pending = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let _guard = limiter.acquire().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
        };
        drop(held);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pending.abort();
        let _ = pending.await;

        assert_eq!(limiter.available_slots(), 1);
    }

    #[tokio::test]
    async fn sites_do_not_share_state() {
        let registry = AdapterRegistry::builder()
            .register(
                StubAdapter::new("slow")
                    .with_rate_limit(RateLimitPolicy::new(1, Duration::from_millis(300))),
            )
            .unwrap()
            .register(
                StubAdapter::new("fast")
                    .with_rate_limit(RateLimitPolicy::new(1, Duration::from_millis(300))),
            )
            .unwrap()
            .build();
        let limiter = RateLimiter::from_registry(&registry);

        let start = Instant::now();
        drop(limiter.for_site("slow").unwrap().acquire().await.unwrap());
        drop(limiter.for_site("fast").unwrap().acquire().await.unwrap());
        assert!(start.elapsed() < Duration::from_millis(200));

        assert!(limiter.for_site("missing").is_err());
    }
}
