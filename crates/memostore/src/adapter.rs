//! Storage adapter contract and the live/stub storage handle

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// Primitive key-value operations consumed by the instrumentation layer.
///
/// Every method is a single backend command and is atomic on its own; no
/// multi-command transactions are offered. List ranges follow Redis index
/// semantics: both ends inclusive, negative indices count from the tail.
pub trait StorageAdapter: Send + Sync {
    /// Increment the integer at `key` by one, treating an absent key as 0
    fn increment(&self, key: &str) -> Result<i64>;

    /// Get the raw bytes at `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set `key` to `value` with no expiry
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Set `key` to `value`, expiring after `ttl`; see [`expiry_seconds`]
    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Append `value` to the list at `key`, returning the new length
    fn append_to_list(&self, key: &str, value: &[u8]) -> Result<usize>;

    /// Read list elements `start..=end`
    fn range_list(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>>;

    /// Check whether `key` holds a live value
    fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key in the storage namespace
    fn flush_all(&self) -> Result<()>;

    /// Release the backend; later calls fail with [`Error::Closed`](crate::Error::Closed)
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Validate an expiry for [`StorageAdapter::set_with_expiry`].
///
/// Expiries are whole seconds, at least one. Anything shorter or with a
/// fractional part is rejected rather than truncated.
pub fn expiry_seconds(ttl: Duration) -> Result<u64> {
    if ttl.as_secs() == 0 || ttl.subsec_nanos() != 0 {
        return Err(Error::InvalidArgument(format!(
            "expiry must be a whole number of seconds, at least one, got {:?}",
            ttl
        )));
    }
    Ok(ttl.as_secs())
}

/// Handle the instrumentation wrappers carry.
///
/// `Live` wrappers record to the adapter and propagate its failures. `Stub`
/// wrappers skip recording entirely and only delegate.
#[derive(Clone)]
pub enum Storage {
    /// Connected backend
    Live(Arc<dyn StorageAdapter>),
    /// No backend, instrumentation is a no-op
    Stub,
}

impl Storage {
    /// Wrap a concrete adapter as a live handle
    pub fn live<A: StorageAdapter + 'static>(adapter: A) -> Self {
        Storage::Live(Arc::new(adapter))
    }

    /// Get the adapter if the handle is live
    pub fn adapter(&self) -> Option<&Arc<dyn StorageAdapter>> {
        match self {
            Storage::Live(adapter) => Some(adapter),
            Storage::Stub => None,
        }
    }

    /// Check if instrumentation will reach a backend
    pub fn is_live(&self) -> bool {
        matches!(self, Storage::Live(_))
    }
}

impl From<Arc<dyn StorageAdapter>> for Storage {
    fn from(adapter: Arc<dyn StorageAdapter>) -> Self {
        Storage::Live(adapter)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Live(_) => f.write_str("Storage::Live"),
            Storage::Stub => f.write_str("Storage::Stub"),
        }
    }
}
