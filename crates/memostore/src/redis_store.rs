//! Redis storage backend
//!
//! One synchronous connection behind a mutex. Each adapter call is a single
//! Redis command, so per-key atomicity is whatever the server provides.

use std::time::Duration;

use parking_lot::Mutex;
use redis::{Connection, RedisResult};
use tracing::info;

use crate::adapter::{expiry_seconds, StorageAdapter};
use crate::error::{Error, Result};

/// Default server address
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Live [`StorageAdapter`] over a Redis server
pub struct RedisStore {
    url: String,
    conn: Mutex<Option<Connection>>,
}

impl RedisStore {
    /// Connect to the server at `url`
    ///
    /// # Arguments
    /// * `url` - Connection string, e.g. `redis://127.0.0.1:6379/0`
    ///
    /// # Returns
    /// * `Result<RedisStore>` - `Error::Unavailable` if the URL is malformed
    ///   or the server cannot be reached
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Unavailable(format!("invalid redis url {}: {}", url, e)))?;
        let conn = client
            .get_connection()
            .map_err(|e| Error::Unavailable(format!("cannot connect to {}: {}", url, e)))?;

        info!(url, "connected to redis");
        Ok(Self {
            url: url.to_string(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Server URL this store was opened with
    pub fn url(&self) -> &str {
        &self.url
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(Error::Closed)?;
        f(conn).map_err(Error::from)
    }
}

impl StorageAdapter for RedisStore {
    fn increment(&self, key: &str) -> Result<i64> {
        self.with_conn(|conn| redis::cmd("INCR").arg(key).query(conn))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| redis::cmd("GET").arg(key).query(conn))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_conn(|conn| redis::cmd("SET").arg(key).arg(value).query(conn))
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let seconds = expiry_seconds(ttl)?;
        self.with_conn(|conn| {
            redis::cmd("SETEX")
                .arg(key)
                .arg(seconds)
                .arg(value)
                .query(conn)
        })
    }

    fn append_to_list(&self, key: &str, value: &[u8]) -> Result<usize> {
        self.with_conn(|conn| redis::cmd("RPUSH").arg(key).arg(value).query(conn))
    }

    fn range_list(&self, key: &str, start: isize, end: isize) -> Result<Vec<Vec<u8>>> {
        self.with_conn(|conn| {
            redis::cmd("LRANGE")
                .arg(key)
                .arg(start)
                .arg(end)
                .query(conn)
        })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| redis::cmd("EXISTS").arg(key).query(conn))
    }

    /// Issues `FLUSHDB`: only the selected database is cleared
    fn flush_all(&self) -> Result<()> {
        self.with_conn(|conn| redis::cmd("FLUSHDB").query(conn))
    }

    fn close(&self) -> Result<()> {
        if self.conn.lock().take().is_some() {
            info!(url = %self.url, "closed redis connection");
        }
        Ok(())
    }
}
