//! # memostore
//!
//! Key-value storage adapters for the memo instrumentation layer.
//!
//! ## Backends
//! - **MemoryStore**: in-process map with counters, lists and lazy TTL expiry
//! - **RedisStore**: a live Redis server over one synchronous connection
//!
//! Callers hold a [`Storage`] handle. `Storage::Live` reaches a backend,
//! `Storage::Stub` turns instrumentation into a no-op.

#![warn(missing_docs)]

mod adapter;
mod clock;
mod error;
mod memory;
mod redis_store;

pub use adapter::{expiry_seconds, Storage, StorageAdapter};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use redis_store::{RedisStore, DEFAULT_REDIS_URL};
