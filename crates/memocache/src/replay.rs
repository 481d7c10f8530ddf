//! Reconstruct call traces from recorded counters and histories

use std::fmt;
use std::io;

use memostore::{Result, Storage};
use serde::Serialize;
use tracing::debug;

use crate::instrument::{inputs_key, outputs_key, Operation};
use crate::value::{decode_integer, decode_text};

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// Argument tuple as recorded, e.g. `('hello',)`
    pub input: String,
    /// Result as recorded
    pub output: String,
}

/// Call history of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    /// Operation identity
    pub identity: String,
    /// Counter record, 0 when absent
    pub calls: i64,
    /// Input/output pairs in call order
    pub entries: Vec<TraceEntry>,
}

impl Trace {
    /// Trace with no recorded calls
    pub fn empty(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            calls: 0,
            entries: Vec::new(),
        }
    }

    /// Write the trace as text, one line per call after the header
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.identity, self.calls)?;
        for entry in &self.entries {
            writeln!(f, "{}(*{}) -> {}", self.identity, entry.input, entry.output)?;
        }
        Ok(())
    }
}

/// Read back the call history of an instrumented operation.
///
/// Returns `Ok(None)` when the operation has no live storage handle. Inputs
/// and outputs are paired by index up to the shorter list, so a call that
/// failed after recording its input is not shown.
pub fn replay<O: Operation + ?Sized>(op: &O) -> Result<Option<Trace>> {
    match op.storage() {
        Some(storage) => replay_history(op.identity(), storage),
        None => Ok(None),
    }
}

/// Read back the call history recorded under `identity`.
///
/// Lets a process that never held the operation, such as a later CLI run
/// against the same Redis database, rebuild its trace. Returns `Ok(None)`
/// for a stub handle.
pub fn replay_history(identity: &str, storage: &Storage) -> Result<Option<Trace>> {
    let Some(adapter) = storage.adapter() else {
        return Ok(None);
    };

    let calls = match adapter.get(identity)? {
        Some(raw) => decode_integer(raw)?,
        None => 0,
    };
    let inputs = adapter.range_list(&inputs_key(identity), 0, -1)?;
    let outputs = adapter.range_list(&outputs_key(identity), 0, -1)?;
    debug!(
        identity,
        calls,
        inputs = inputs.len(),
        outputs = outputs.len(),
        "replaying call history"
    );

    let entries = inputs
        .into_iter()
        .zip(outputs)
        .map(|(input, output)| -> Result<TraceEntry> {
            Ok(TraceEntry {
                input: decode_text(input)?,
                output: decode_text(output)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(Trace {
        identity: identity.to_string(),
        calls,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{instrument, FnOperation};
    use crate::value::{Args, Value};
    use memostore::{Error, MemoryStore, Storage, StorageAdapter};
    use std::sync::Arc;

    fn echo(storage: Storage) -> impl Operation {
        instrument(
            FnOperation::new("Echo.say", |args: &Args| {
                Ok(Value::Text(format!("{} args", args.len())))
            }),
            storage,
        )
    }

    #[test]
    fn test_replay_lists_calls_in_order() {
        let store = Arc::new(MemoryStore::new());
        let op = echo(Storage::Live(store));

        op.invoke(&Args::one("a")).unwrap();
        op.invoke(&Args::new(vec![Value::from("b"), Value::from(2)])).unwrap();

        let trace = replay(&op).unwrap().unwrap();
        assert_eq!(trace.calls, 2);
        assert_eq!(
            trace.to_string(),
            "Echo.say was called 2 times:\n\
             Echo.say(*('a',)) -> 1 args\n\
             Echo.say(*('b', 2)) -> 2 args\n"
        );
    }

    #[test]
    fn test_replay_without_calls() {
        let op = echo(Storage::live(MemoryStore::new()));

        let trace = replay(&op).unwrap().unwrap();
        assert_eq!(trace, Trace::empty("Echo.say"));
        assert_eq!(trace.to_string(), "Echo.say was called 0 times:\n");
    }

    #[test]
    fn test_replay_stub_is_noop() {
        let op = echo(Storage::Stub);
        op.invoke(&Args::one("a")).unwrap();

        assert!(replay(&op).unwrap().is_none());
    }

    #[test]
    fn test_replay_unwrapped_operation_is_noop() {
        let op = FnOperation::new("Plain.op", |_: &Args| Ok(Value::Integer(0)));
        assert!(replay(&op).unwrap().is_none());
    }

    #[test]
    fn test_replay_tolerates_missing_outputs() {
        let store = Arc::new(MemoryStore::new());
        let op = echo(Storage::Live(store.clone()));

        op.invoke(&Args::one("a")).unwrap();
        store.append_to_list("Echo.say:inputs", b"('lost',)").unwrap();

        let trace = replay(&op).unwrap().unwrap();
        assert_eq!(trace.calls, 1);
        assert_eq!(trace.entries.len(), 1);
    }

    #[test]
    fn test_replay_surfaces_bad_utf8() {
        let store = Arc::new(MemoryStore::new());
        let op = echo(Storage::Live(store.clone()));

        store.append_to_list("Echo.say:inputs", &[0xff, 0xfe]).unwrap();
        store.append_to_list("Echo.say:outputs", b"ok").unwrap();

        assert!(matches!(replay(&op), Err(Error::Decode(_))));
    }

    #[test]
    fn test_replay_history_by_identity() {
        let store = Arc::new(MemoryStore::new());
        let op = echo(Storage::Live(store.clone()));
        op.invoke(&Args::one("a")).unwrap();

        let storage = Storage::Live(store);
        let trace = replay_history("Echo.say", &storage).unwrap().unwrap();
        assert_eq!(trace, replay(&op).unwrap().unwrap());

        let other = replay_history("Other.op", &storage).unwrap().unwrap();
        assert_eq!(other, Trace::empty("Other.op"));

        assert!(replay_history("Echo.say", &Storage::Stub).unwrap().is_none());
    }

    #[test]
    fn test_write_to() {
        let trace = Trace {
            identity: "Op.run".to_string(),
            calls: 1,
            entries: vec![TraceEntry {
                input: "(1,)".to_string(),
                output: "2".to_string(),
            }],
        };

        let mut out = Vec::new();
        trace.write_to(&mut out).unwrap();
        assert_eq!(out, b"Op.run was called 1 times:\nOp.run(*(1,)) -> 2\n");
    }
}
