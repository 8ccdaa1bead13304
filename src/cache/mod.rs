//! Offline request cache.
//!
//! This module answers outgoing requests on behalf of the network:
//! - Pre-caches an offline fallback page on install
//! - Drops partitions of older versions on activate
//! - Routes GET requests by destination to a caching strategy
//! - Serves stored or synthesized responses when the network is unavailable

mod layer;
mod network;
mod storage;
mod traits;

pub use layer::ServiceWorker;
pub use network::HttpNetwork;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{Destination, Request};
