//! Client for the process-metrics aggregation service.
//!
//! Filters live in a navigable query string ([`filters`]), are turned into
//! requests ([`request`]), fetched through a [`MetricsSource`] such as
//! [`MetricsGateway`], and cached per `(endpoint, filters)` by
//! [`QueryCache`], which guarantees at most one request in flight per key.

pub mod cache;
pub mod config;
pub mod error;
pub mod filters;
pub mod gateway;
pub mod request;

pub use cache::CacheEntry;
pub use cache::CacheKey;
pub use cache::CacheOptions;
pub use cache::CacheState;
pub use cache::CacheStats;
pub use cache::QueryCache;
pub use config::ClientConfig;
pub use error::CacheError;
pub use error::ConfigError;
pub use error::GatewayError;
pub use filters::FilterStore;
pub use filters::NavState;
pub use gateway::MetricsGateway;
pub use gateway::MetricsSource;
pub use request::MetricsRequest;

/// Gateway and cache wired together from one config.
pub fn connect(config: &ClientConfig) -> Result<QueryCache<MetricsGateway>, ConfigError> {
    let gateway = MetricsGateway::new(config)?;
    Ok(QueryCache::new(gateway, CacheOptions::from(config)))
}
