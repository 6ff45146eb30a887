//! Caching layer for directions lookups.
//!
//! Pickup/dropoff edits tend to flip back and forth between the same few
//! points, and several views of one shipment ask for the same route. Lookups
//! are cached by origin/destination quantised to polyline precision (1e-5
//! degrees), so two coordinates that encode identically share an entry.
//! Only successful answers are cached; "no route" counts as a success.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::directions::{DirectionsError, DirectionsOutcome, DirectionsService};
use crate::domain::Coordinate;

/// Cache key: (origin lat, origin lng, destination lat, destination lng)
/// in units of 1e-5 degrees.
type RouteKey = (i32, i32, i32, i32);

/// Configuration for the route cache.
#[derive(Debug, Clone)]
pub struct RouteCacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for RouteCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_capacity: 1000,
        }
    }
}

fn quantise(value: f64) -> i32 {
    (value * 1e5).round() as i32
}

fn route_key(origin: Coordinate, destination: Coordinate) -> RouteKey {
    (
        quantise(origin.latitude()),
        quantise(origin.longitude()),
        quantise(destination.latitude()),
        quantise(destination.longitude()),
    )
}

/// Directions service with caching.
///
/// Wraps any `DirectionsService` and caches its successful answers.
pub struct CachedDirections<D> {
    inner: D,
    cache: MokaCache<RouteKey, DirectionsOutcome>,
}

impl<D: DirectionsService> CachedDirections<D> {
    /// Create a new cached service.
    pub fn new(inner: D, config: &RouteCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { inner, cache }
    }

    /// Access the underlying service for lookups that bypass the cache.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Get cache statistics (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<D: DirectionsService> DirectionsService for CachedDirections<D> {
    async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsOutcome, DirectionsError> {
        let key = route_key(origin, destination);

        if let Some(cached) = self.cache.get(&key).await {
            trace!(%origin, %destination, "route cache hit");
            return Ok(cached);
        }

        let outcome = self.inner.directions(origin, destination).await?;
        self.cache.insert(key, outcome.clone()).await;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::directions::RawRoute;

    /// Counts calls; fails while `fail` is set.
    struct CountingDirections {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingDirections {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DirectionsService for CountingDirections {
        async fn directions(
            &self,
            _origin: Coordinate,
            _destination: Coordinate,
        ) -> Result<DirectionsOutcome, DirectionsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DirectionsError::RateLimited);
            }
            Ok(DirectionsOutcome::Route(RawRoute {
                encoded_polyline: "??".into(),
                distance_m: None,
                duration_s: None,
            }))
        }
    }

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[tokio::test]
    async fn repeated_lookup_hits_cache() {
        let cached = CachedDirections::new(CountingDirections::new(false), &RouteCacheConfig::default());

        let a = cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.unwrap();
        let b = cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(cached.inner().calls(), 1);
    }

    #[tokio::test]
    async fn nearby_points_share_entry() {
        let cached = CachedDirections::new(CountingDirections::new(false), &RouteCacheConfig::default());

        cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.unwrap();
        cached
            .directions(c(1.000001, 1.0), c(2.0, 2.000002))
            .await
            .unwrap();

        assert_eq!(cached.inner().calls(), 1);
    }

    #[tokio::test]
    async fn different_points_miss() {
        let cached = CachedDirections::new(CountingDirections::new(false), &RouteCacheConfig::default());

        cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.unwrap();
        cached.directions(c(2.0, 2.0), c(1.0, 1.0)).await.unwrap();

        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cached = CachedDirections::new(CountingDirections::new(true), &RouteCacheConfig::default());

        assert!(cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.is_err());
        assert!(cached.directions(c(1.0, 1.0), c(2.0, 2.0)).await.is_err());

        assert_eq!(cached.inner().calls(), 2);
    }

    #[test]
    fn default_config() {
        let config = RouteCacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.max_capacity, 1000);
    }

    #[test]
    fn key_quantisation() {
        assert_eq!(
            route_key(c(38.5, -120.2), c(-0.000004, 0.000006)),
            (3_850_000, -12_020_000, 0, 1)
        );
    }
}
