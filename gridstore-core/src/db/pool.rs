//! Pooled SQLite connections
//!
//! The pool hands out live connections under a single mutex and grows by a
//! fixed increment whenever a caller finds it empty. Pool size only grows;
//! there is no shrink-back, cap, or acquire timeout. Checkouts are scoped:
//! [`PooledConnection`] returns its connection on drop, on every exit path.

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connections opened up front by [`ConnectionPool::open`] unless configured
/// otherwise.
pub const DEFAULT_INITIAL_SIZE: usize = 4;

/// Connections added per growth step when the pool runs empty.
pub const DEFAULT_GROWTH: usize = 3;

/// Lock wait ceiling for a busy SQLite database. This is driver-level retry
/// on SQLITE_BUSY, not an operation timeout; a healthy writer still blocks
/// its caller until it finishes.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct PoolState {
    /// Connections currently checked in
    idle: Vec<Connection>,
    /// Every connection ever opened, checked out or not
    total: usize,
}

struct PoolInner {
    path: PathBuf,
    growth: usize,
    state: Mutex<PoolState>,
}

/// A growing pool of SQLite connections to one database file.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

/// Open a connection with the standard pragmas applied.
fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(conn)
}

impl ConnectionPool {
    /// Open a pool of `initial` connections to the database at `path`,
    /// creating parent directories as needed.
    ///
    /// `growth` is the number of connections added each time `acquire` finds
    /// the pool empty; it is clamped to at least 1 so an acquire can always
    /// be satisfied.
    pub fn open(path: &Path, initial: usize, growth: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let growth = growth.max(1);
        let mut idle = Vec::with_capacity(initial);
        for _ in 0..initial {
            idle.push(open_connection(path)?);
        }

        tracing::debug!(path = %path.display(), initial, growth, "Connection pool opened");

        Ok(Self {
            inner: Arc::new(PoolInner {
                path: path.to_path_buf(),
                growth,
                state: Mutex::new(PoolState {
                    total: idle.len(),
                    idle,
                }),
            }),
        })
    }

    /// Open a pool with the default sizing.
    pub fn open_default(path: &Path) -> Result<Self> {
        Self::open(path, DEFAULT_INITIAL_SIZE, DEFAULT_GROWTH)
    }

    /// Check out a connection, growing the pool first if none are idle.
    ///
    /// Never blocks waiting for a release; an empty pool grows instead.
    pub fn acquire(&self) -> Result<PooledConnection> {
        let mut state = self.inner.state.lock().unwrap();

        if state.idle.is_empty() {
            for _ in 0..self.inner.growth {
                state.idle.push(open_connection(&self.inner.path)?);
                state.total += 1;
            }
            tracing::debug!(
                grown_by = self.inner.growth,
                total = state.total,
                "Pool was empty, grew to satisfy acquire"
            );
        }

        let conn = state
            .idle
            .pop()
            .ok_or_else(|| Error::Pool("pool empty after growth".to_string()))?;

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Commit or roll back and close every idle connection.
    ///
    /// Shutdown path: `is_failure` rolls back any open transaction instead of
    /// committing it. Connections currently checked out are not touched; they
    /// return to the (now empty) pool when their guards drop.
    pub fn drain_all(&self, is_failure: bool) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        let mut drained = 0usize;

        while let Some(conn) = state.idle.pop() {
            if !conn.is_autocommit() {
                conn.execute_batch(if is_failure { "ROLLBACK" } else { "COMMIT" })?;
            }
            conn.close().map_err(|(_, e)| Error::from(e))?;
            state.total -= 1;
            drained += 1;
        }

        tracing::debug!(drained, is_failure, "Connection pool drained");
        Ok(())
    }

    /// Total connections ever opened and not yet drained.
    pub fn size(&self) -> usize {
        self.inner.state.lock().unwrap().total
    }

    /// Connections currently checked in.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().unwrap().idle.len()
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

/// Scoped connection checkout.
///
/// Derefs to [`rusqlite::Connection`]; the connection returns to the pool
/// when the guard drops, including on error and panic paths.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection already released")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut state) = self.pool.state.lock() {
                state.idle.push(conn);
            }
            // A poisoned lock means a panic elsewhere; the connection is
            // closed by its own drop in that case.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn temp_pool(initial: usize, growth: usize) -> (tempfile::TempDir, ConnectionPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(&dir.path().join("pool.db"), initial, growth).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_acquire_release_cycle() {
        let (_dir, pool) = temp_pool(2, 3);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.idle_count(), 2);

        {
            let conn = pool.acquire().unwrap();
            conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).unwrap();
            assert_eq!(pool.idle_count(), 1);
        }

        // Guard dropped, connection is back
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_release_happens_on_error_path() {
        let (_dir, pool) = temp_pool(1, 1);

        let result: Result<()> = (|| {
            let conn = pool.acquire()?;
            conn.execute("SELECT * FROM not_a_table", [])?;
            Ok(())
        })();
        assert!(result.is_err());

        // The failed closure still returned its connection
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_empty_pool_grows_by_increment() {
        let (_dir, pool) = temp_pool(1, 3);

        let held = pool.acquire().unwrap();
        assert_eq!(pool.idle_count(), 0);

        // Second acquire finds the pool empty and grows it by 3
        let second = pool.acquire().unwrap();
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.idle_count(), 2);

        drop(held);
        drop(second);
        assert_eq!(pool.idle_count(), 4);
    }

    #[test]
    fn test_concurrent_burst_never_starves() {
        // Pool of 2, 3 concurrent acquires: the third must succeed via
        // growth, and the pool stays >= 3 afterwards
        let (_dir, pool) = temp_pool(2, 3);
        let pool = Arc::new(pool);
        let barrier = Arc::new(Barrier::new(3));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let conn = pool.acquire().unwrap();
                    // Hold the checkout until all three threads have one, so
                    // the third acquire is forced to grow the pool
                    barrier.wait();
                    conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }

        assert!(pool.size() >= 3, "pool size {} after burst", pool.size());
        assert_eq!(pool.idle_count(), pool.size());
    }

    #[test]
    fn test_drain_all_closes_idle() {
        let (_dir, pool) = temp_pool(3, 3);
        pool.drain_all(false).unwrap();
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.idle_count(), 0);

        // The pool is still usable; the next acquire regrows it
        let conn = pool.acquire().unwrap();
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).unwrap();
    }

    #[test]
    fn test_drain_all_rolls_back_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let pool = ConnectionPool::open(&path, 1, 1).unwrap();

        {
            let conn = pool.acquire().unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
            // Leave a transaction open on the checked-in connection
            conn.execute_batch("BEGIN; INSERT INTO t (x) VALUES (42);")
                .unwrap();
        }

        pool.drain_all(true).unwrap();

        let verify = Connection::open(&path).unwrap();
        let count: i64 = verify
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0, "failure drain should roll back");
    }
}
