//! # memocache
//!
//! Call counting, call history and replay over a key-value store.
//!
//! ## Architecture
//! - **Operation**: anything invocable with positional [`Args`]
//! - **CallCounter / CallRecorder**: wrappers that record to a [`Storage`] handle
//! - **replay**: rebuilds a [`Trace`] from the recorded counter and histories
//! - **Cache**: UUID-keyed value store whose `store` is instrumented
//! - **WebCache**: page cache with storage-side TTL and access counters
//!
//! ## Key layout
//! - `<identity>`: call counter
//! - `<identity>:inputs` / `<identity>:outputs`: call history lists
//! - `count:<url>` / `cached:<url>`: web cache

#![warn(missing_docs)]

mod cache;
mod instrument;
mod replay;
mod stats;
mod value;
mod web;

pub use cache::{Cache, StoreOperation, STORE_IDENTITY};
pub use instrument::{
    inputs_key, instrument, outputs_key, CallCounter, CallRecorder, FnOperation, Instrumented,
    Operation,
};
pub use replay::{replay, replay_history, Trace, TraceEntry};
pub use stats::{CacheStats, StatsSnapshot};
pub use value::{decode_float, decode_integer, decode_text, Args, Value};
pub use web::{
    cached_key, count_key, Fetcher, HttpFetcher, WebCache, WebCacheConfig, DEFAULT_PAGE_TTL,
};

pub use memostore::{
    Clock, Error, MemoryStore, MockClock, RedisStore, Result, Storage, StorageAdapter, SystemClock,
};
