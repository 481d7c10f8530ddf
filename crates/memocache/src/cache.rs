//! Cache: instrumented value store over a storage adapter

use std::sync::Arc;

use memostore::{Error, Result, Storage, StorageAdapter};
use tracing::{info, warn};
use uuid::Uuid;

use crate::instrument::{instrument, Instrumented, Operation};
use crate::replay::{replay, Trace};
use crate::value::{decode_float, decode_integer, decode_text, Args, Value};

/// Identity of [`Cache::store`] in counter and history keys
pub const STORE_IDENTITY: &str = "Cache.store";

/// Base operation behind [`Cache::store`]: persist one value under a fresh key
pub struct StoreOperation {
    adapter: Arc<dyn StorageAdapter>,
}

impl Operation for StoreOperation {
    fn identity(&self) -> &str {
        STORE_IDENTITY
    }

    fn invoke(&self, args: &Args) -> Result<Value> {
        let data = match args.values() {
            [data] => data,
            values => {
                return Err(Error::InvalidArgument(format!(
                    "store takes exactly one value, got {}",
                    values.len()
                )))
            }
        };

        let key = Uuid::new_v4().to_string();
        self.adapter.set(&key, &data.to_bytes())?;
        Ok(Value::Text(key))
    }
}

/// Value store whose `store` calls are counted and recorded
pub struct Cache {
    adapter: Arc<dyn StorageAdapter>,
    store: Instrumented<StoreOperation>,
}

impl Cache {
    /// Create a cache over `adapter`.
    ///
    /// **Destructive:** this flushes the adapter's entire namespace before
    /// returning. Anything else sharing the same Redis database (or the same
    /// `MemoryStore`) loses its keys.
    ///
    /// # Returns
    /// * `Result<Cache>` - the flush error if the backend is unusable
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Result<Self> {
        warn!("flushing storage namespace for new cache");
        adapter.flush_all()?;

        let storage = Storage::Live(Arc::clone(&adapter));
        let store = instrument(
            StoreOperation {
                adapter: Arc::clone(&adapter),
            },
            storage,
        );

        Ok(Self { adapter, store })
    }

    /// Store a value under a new random key
    ///
    /// # Arguments
    /// * `data` - text, bytes, integer or float
    ///
    /// # Returns
    /// * `Result<String>` - the generated key
    pub fn store(&self, data: impl Into<Value>) -> Result<String> {
        let key = self.store.invoke(&Args::one(data))?;
        Ok(key.to_string())
    }

    /// Get the raw bytes at `key`, `None` if absent
    pub fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.adapter.get(key)
    }

    /// Get the value at `key` converted by `decode`
    pub fn retrieve_with<T, F>(&self, key: &str, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(Vec<u8>) -> Result<T>,
    {
        self.retrieve(key)?.map(decode).transpose()
    }

    /// Get the value at `key` as UTF-8 text
    pub fn retrieve_as_text(&self, key: &str) -> Result<Option<String>> {
        self.retrieve_with(key, decode_text)
    }

    /// Get the value at `key` as a base-10 integer
    pub fn retrieve_as_integer(&self, key: &str) -> Result<Option<i64>> {
        self.retrieve_with(key, decode_integer)
    }

    /// Get the value at `key` as a float
    pub fn retrieve_as_float(&self, key: &str) -> Result<Option<f64>> {
        self.retrieve_with(key, decode_float)
    }

    /// Check if `key` holds a value
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.adapter.exists(key)
    }

    /// The instrumented `store` operation, for [`replay`]
    pub fn store_operation(&self) -> &Instrumented<StoreOperation> {
        &self.store
    }

    /// Call history of [`Cache::store`]
    pub fn replay(&self) -> Result<Trace> {
        Ok(replay(&self.store)?.unwrap_or_else(|| Trace::empty(STORE_IDENTITY)))
    }

    /// Storage adapter this cache writes to
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Close the underlying adapter
    pub fn close(self) -> Result<()> {
        info!("closing cache");
        self.adapter.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memostore::MemoryStore;

    fn new_cache() -> (Arc<MemoryStore>, Cache) {
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(store.clone()).unwrap();
        (store, cache)
    }

    #[test]
    fn test_store_and_retrieve_text() {
        let (_, cache) = new_cache();

        let key = cache.store("hello").unwrap();
        assert_eq!(cache.retrieve_as_text(&key).unwrap(), Some("hello".to_string()));
        assert_eq!(cache.retrieve(&key).unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_store_returns_uuid_keys() {
        let (_, cache) = new_cache();

        let a = cache.store("x").unwrap();
        let b = cache.store("x").unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_retrieve_integer() {
        let (_, cache) = new_cache();

        let text_key = cache.store("1234").unwrap();
        let int_key = cache.store(1234).unwrap();
        assert_eq!(cache.retrieve_as_integer(&text_key).unwrap(), Some(1234));
        assert_eq!(cache.retrieve_as_integer(&int_key).unwrap(), Some(1234));
    }

    #[test]
    fn test_retrieve_float_and_bytes() {
        let (_, cache) = new_cache();

        let float_key = cache.store(2.5).unwrap();
        let bytes_key = cache.store(vec![0u8, 159, 146, 150]).unwrap();
        assert_eq!(cache.retrieve_as_float(&float_key).unwrap(), Some(2.5));
        assert_eq!(
            cache.retrieve(&bytes_key).unwrap(),
            Some(vec![0u8, 159, 146, 150])
        );
        assert!(matches!(
            cache.retrieve_as_text(&bytes_key),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_retrieve_with_custom_decoder() {
        let (_, cache) = new_cache();

        let key = cache.store("abc").unwrap();
        let len = cache.retrieve_with(&key, |raw| Ok(raw.len())).unwrap();
        assert_eq!(len, Some(3));
    }

    #[test]
    fn test_retrieve_missing_is_none() {
        let (_, cache) = new_cache();

        assert_eq!(cache.retrieve("nope").unwrap(), None);
        assert_eq!(cache.retrieve_as_text("nope").unwrap(), None);
        assert_eq!(cache.retrieve_as_integer("nope").unwrap(), None);
        assert!(!cache.contains("nope").unwrap());
    }

    #[test]
    fn test_new_flushes_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.set("stale", b"data").unwrap();

        let cache = Cache::new(store.clone()).unwrap();
        assert!(!cache.contains("stale").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_is_counted_and_recorded() {
        let (store, cache) = new_cache();

        let key = cache.store("hello").unwrap();

        assert_eq!(store.get(STORE_IDENTITY).unwrap(), Some(b"1".to_vec()));
        assert_eq!(
            store.range_list("Cache.store:inputs", 0, -1).unwrap(),
            vec![b"('hello',)".to_vec()]
        );
        assert_eq!(
            store.range_list("Cache.store:outputs", 0, -1).unwrap(),
            vec![key.into_bytes()]
        );
    }

    #[test]
    fn test_store_operation_rejects_wrong_arity() {
        let (store, cache) = new_cache();

        let err = cache
            .store_operation()
            .invoke(&Args::new(vec![Value::from("a"), Value::from("b")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        // Counted and input recorded, no output
        assert_eq!(store.get(STORE_IDENTITY).unwrap(), Some(b"1".to_vec()));
        assert!(store.range_list("Cache.store:outputs", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_replay_single_store() {
        let (_, cache) = new_cache();

        let key = cache.store("hello").unwrap();
        let trace = cache.replay().unwrap();

        assert_eq!(
            trace.to_string(),
            format!(
                "Cache.store was called 1 times:\nCache.store(*('hello',)) -> {}\n",
                key
            )
        );
    }

    #[test]
    fn test_close() {
        let (store, cache) = new_cache();
        cache.store("x").unwrap();

        cache.close().unwrap();
        assert!(matches!(store.get("x"), Err(Error::Closed)));
    }
}
