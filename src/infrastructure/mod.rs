//! Infrastructure adapters: connections, rate limiting, caching, routing.

pub mod backoff;
pub mod cache;
pub mod facts;
pub mod limiter;
pub mod pool;
pub mod router;
pub mod ws;

pub use backoff::Backoff;
pub use cache::{CacheCategory, CacheStats, DataCache};
pub use facts::FactsClient;
pub use limiter::{EndpointClass, LimiterStats, Priority, RateLimiter};
pub use pool::{ConnectionPool, PoolStats, StreamEvent, StreamHandle};
pub use router::{EventRouter, EventStream, RouterStats};
pub use ws::{ws_transport_factory, WsTransport};
