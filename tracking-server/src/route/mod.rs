//! Route lookup, decoding and caching.

mod cache;
mod fetcher;

pub use cache::{CachedDirections, RouteCacheConfig};
pub use fetcher::{
    CommittedRoute, DecodedRoute, RouteError, RouteFetcher, RouteFetcherConfig, RouteOutcome,
    RouteQuery,
};
