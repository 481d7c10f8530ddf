//! In-process storage backend
//!
//! Holds strings and lists in a single map guarded by one mutex, so every
//! primitive is atomic. Expired entries are dropped lazily when touched.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};

use crate::adapter::{expiry_seconds, StorageAdapter};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Value held under a key
enum Slot {
    Bytes(Vec<u8>),
    List(Vec<Vec<u8>>),
}

struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn persistent(slot: Slot) -> Self {
        Self {
            slot,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type EntryMap = HashMap<String, Entry, RandomState>;

/// MemoryStore is an in-process [`StorageAdapter`]
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: Mutex<EntryMap>,
    clock: C,
    closed: RwLock<bool>,
}

impl MemoryStore<SystemClock> {
    /// Create an empty store on the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Create an empty store driven by `clock`
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_hasher(RandomState::new())),
            clock,
            closed: RwLock::new(false),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Check if the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Lock the map with `key` already purged if it has expired
    fn lock_live(&self, key: &str) -> Result<parking_lot::MutexGuard<'_, EntryMap>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(entries)
    }
}

impl<C: Clock> StorageAdapter for MemoryStore<C> {
    fn increment(&self, key: &str) -> Result<i64> {
        let mut entries = self.lock_live(key)?;

        match entries.get_mut(key) {
            Some(Entry {
                slot: Slot::Bytes(raw),
                ..
            }) => {
                let current = std::str::from_utf8(raw)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        Error::Backend("value is not an integer or out of range".to_string())
                    })?;
                let next = current
                    .checked_add(1)
                    .ok_or_else(|| Error::Backend("increment would overflow".to_string()))?;
                // Expiry is kept, as with INCR
                *raw = next.to_string().into_bytes();
                Ok(next)
            }
            Some(_) => Err(Error::Backend(WRONG_TYPE.to_string())),
            None => {
                entries.insert(key.to_string(), Entry::persistent(Slot::Bytes(b"1".to_vec())));
                Ok(1)
            }
        }
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.lock_live(key)?;

        match entries.get(key).map(|entry| &entry.slot) {
            Some(Slot::Bytes(raw)) => Ok(Some(raw.clone())),
            Some(Slot::List(_)) => Err(Error::Backend(WRONG_TYPE.to_string())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.lock_live(key)?;
        entries.insert(key.to_string(), Entry::persistent(Slot::Bytes(value.to_vec())));
        Ok(())
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let seconds = expiry_seconds(ttl)?;
        let expires_at = self.clock.now() + Duration::from_secs(seconds);
        let mut entries = self.lock_live(key)?;
        entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Bytes(value.to_vec()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    fn append_to_list(&self, key: &str, value: &[u8]) -> Result<usize> {
        let mut entries = self.lock_live(key)?;

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::persistent(Slot::List(Vec::new())));

        match &mut entry.slot {
            Slot::List(items) => {
                items.push(value.to_vec());
                Ok(items.len())
            }
            Slot::Bytes(_) => Err(Error::Backend(WRONG_TYPE.to_string())),
        }
    }

    fn range_list(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>> {
        let entries = self.lock_live(key)?;

        match entries.get(key).map(|entry| &entry.slot) {
            Some(Slot::List(items)) => Ok(match range_bounds(items.len(), start, end) {
                Some((first, last)) => items[first..=last].to_vec(),
                None => Vec::new(),
            }),
            Some(Slot::Bytes(_)) => Err(Error::Backend(WRONG_TYPE.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.lock_live(key)?;
        Ok(entries.contains_key(key))
    }

    fn flush_all(&self) -> Result<()> {
        self.ensure_open()?;
        self.entries.lock().clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut closed = self.closed.write();
        if !*closed {
            self.entries.lock().clear();
            *closed = true;
        }
        Ok(())
    }
}

/// Resolve inclusive Redis-style list indices against `len`
fn range_bounds(len: usize, start: isize, end: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let end = if end < 0 { end + len } else { end.min(len - 1) };

    if start > end || start >= len {
        return None;
    }
    Some((start as usize, end as usize))
}
