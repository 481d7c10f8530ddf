//! Call counting and call history wrappers
//!
//! Wrappers implement [`Operation`] themselves, so they nest. The usual
//! composition from [`instrument`] is `CallCounter<CallRecorder<O>>`: each call
//! increments the counter, appends the input, runs the operation and, only if
//! it succeeds, appends the output. A failing call therefore leaves the
//! counter and the input history one entry ahead of the output history.

use memostore::{Result, Storage};
use tracing::debug;

use crate::value::{Args, Value};

/// Something that can be invoked with positional arguments
pub trait Operation {
    /// Stable identity, e.g. `Cache.store`; the root of every history key
    fn identity(&self) -> &str;

    /// Run the operation
    fn invoke(&self, args: &Args) -> Result<Value>;

    /// Storage handle the operation records to, if any
    fn storage(&self) -> Option<&Storage> {
        None
    }
}

/// Key of the input history list for `identity`
pub fn inputs_key(identity: &str) -> String {
    format!("{}:inputs", identity)
}

/// Key of the output history list for `identity`
pub fn outputs_key(identity: &str) -> String {
    format!("{}:outputs", identity)
}

/// Plain closure with an identity
pub struct FnOperation<F> {
    identity: String,
    f: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&Args) -> Result<Value>,
{
    /// Name a closure
    pub fn new(identity: impl Into<String>, f: F) -> Self {
        Self {
            identity: identity.into(),
            f,
        }
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&Args) -> Result<Value>,
{
    fn identity(&self) -> &str {
        &self.identity
    }

    fn invoke(&self, args: &Args) -> Result<Value> {
        (self.f)(args)
    }
}

/// Increments the counter at the operation's identity on every call
pub struct CallCounter<O> {
    inner: O,
    storage: Storage,
}

impl<O: Operation> CallCounter<O> {
    /// Wrap `inner`
    pub fn new(inner: O, storage: Storage) -> Self {
        Self { inner, storage }
    }

    /// Wrapped operation
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Operation> Operation for CallCounter<O> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn invoke(&self, args: &Args) -> Result<Value> {
        if let Some(adapter) = self.storage.adapter() {
            let calls = adapter.increment(self.identity())?;
            debug!(identity = self.identity(), calls, "counted call");
        }
        self.inner.invoke(args)
    }

    fn storage(&self) -> Option<&Storage> {
        Some(&self.storage)
    }
}

/// Appends arguments and results to the operation's history lists
pub struct CallRecorder<O> {
    inner: O,
    storage: Storage,
}

impl<O: Operation> CallRecorder<O> {
    /// Wrap `inner`
    pub fn new(inner: O, storage: Storage) -> Self {
        Self { inner, storage }
    }

    /// Wrapped operation
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Operation> Operation for CallRecorder<O> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn invoke(&self, args: &Args) -> Result<Value> {
        let Some(adapter) = self.storage.adapter() else {
            return self.inner.invoke(args);
        };
        let identity = self.identity();

        let input = args.to_string();
        adapter.append_to_list(&inputs_key(identity), input.as_bytes())?;
        debug!(identity, %input, "recorded input");

        let result = self.inner.invoke(args)?;

        adapter.append_to_list(&outputs_key(identity), &result.to_bytes())?;
        debug!(identity, output = %result, "recorded output");

        Ok(result)
    }

    fn storage(&self) -> Option<&Storage> {
        Some(&self.storage)
    }
}

/// Counter outside recorder outside `op`
pub type Instrumented<O> = CallCounter<CallRecorder<O>>;

/// Wrap `op` with both call counting and call history on `storage`
pub fn instrument<O: Operation>(op: O, storage: Storage) -> Instrumented<O> {
    CallCounter::new(CallRecorder::new(op, storage.clone()), storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memostore::{Error, MemoryStore, StorageAdapter};
    use std::sync::Arc;

    fn double() -> FnOperation<impl Fn(&Args) -> Result<Value>> {
        FnOperation::new("Math.double", |args: &Args| match args.values() {
            [Value::Integer(n)] => Ok(Value::Integer(n * 2)),
            _ => Err(Error::InvalidArgument("expected one integer".to_string())),
        })
    }

    fn live() -> (Arc<MemoryStore>, Storage) {
        let store = Arc::new(MemoryStore::new());
        let storage = Storage::Live(store.clone());
        (store, storage)
    }

    #[test]
    fn test_history_keys() {
        assert_eq!(inputs_key("Cache.store"), "Cache.store:inputs");
        assert_eq!(outputs_key("Cache.store"), "Cache.store:outputs");
    }

    #[test]
    fn test_counter_increments_per_call() {
        let (store, storage) = live();
        let op = CallCounter::new(double(), storage);

        assert_eq!(op.invoke(&Args::one(2)).unwrap(), Value::Integer(4));
        assert_eq!(op.invoke(&Args::one(5)).unwrap(), Value::Integer(10));

        assert_eq!(store.get("Math.double").unwrap(), Some(b"2".to_vec()));
        assert!(!store.exists("Math.double:inputs").unwrap());
    }

    #[test]
    fn test_recorder_appends_inputs_and_outputs() {
        let (store, storage) = live();
        let op = CallRecorder::new(double(), storage);

        op.invoke(&Args::one(3)).unwrap();
        op.invoke(&Args::one(4)).unwrap();

        assert_eq!(
            store.range_list("Math.double:inputs", 0, -1).unwrap(),
            vec![b"(3,)".to_vec(), b"(4,)".to_vec()]
        );
        assert_eq!(
            store.range_list("Math.double:outputs", 0, -1).unwrap(),
            vec![b"6".to_vec(), b"8".to_vec()]
        );
        assert!(!store.exists("Math.double").unwrap());
    }

    #[test]
    fn test_failing_call_records_input_only() {
        let (store, storage) = live();
        let op = instrument(double(), storage);

        op.invoke(&Args::one(1)).unwrap();
        let err = op.invoke(&Args::one("x")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        assert_eq!(store.get("Math.double").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.range_list("Math.double:inputs", 0, -1).unwrap().len(), 2);
        assert_eq!(store.range_list("Math.double:outputs", 0, -1).unwrap().len(), 1);
    }

    #[test]
    fn test_stub_storage_only_delegates() {
        let op = instrument(double(), Storage::Stub);

        assert_eq!(op.invoke(&Args::one(21)).unwrap(), Value::Integer(42));
        assert!(!op.storage().unwrap().is_live());
    }

    #[test]
    fn test_live_adapter_failure_propagates() {
        let (store, storage) = live();
        let op = instrument(double(), storage);

        store.close().unwrap();
        assert!(matches!(op.invoke(&Args::one(1)), Err(Error::Closed)));
    }

    #[test]
    fn test_identity_passes_through() {
        let op = instrument(double(), Storage::Stub);

        assert_eq!(op.identity(), "Math.double");
        assert_eq!(op.inner().identity(), "Math.double");
        assert_eq!(op.inner().inner().identity(), "Math.double");
    }
}
