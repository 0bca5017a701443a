//! Rust counterpart of the browser data client: action calls over HTTP with a
//! session cookie store and a TTL response cache.

pub mod cache;
pub mod data_client;

pub use cache::{CacheStats, ResponseCache};
pub use data_client::{ClientError, DataClient};
