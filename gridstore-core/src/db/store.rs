//! Storage engine for files, filters, and their coordinate links
//!
//! Every mutating operation checks a connection out of the pool, runs inside
//! one transaction, and commits on success; on any error the transaction
//! rolls back when it drops and the error is returned as a value. Reads of a
//! missing row are `Ok(None)`, never an error.

use crate::db::pool::{ConnectionPool, DEFAULT_GROWTH, DEFAULT_INITIAL_SIZE};
use crate::db::schema;
use crate::error::{Error, Result};
use crate::types::{split_filename, FileRecord, FileSummary, FilterRecord};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

/// Storage engine over a pooled SQLite database.
///
/// Owns schema creation at open; all CRUD goes through pooled connections.
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Open (or create) the store at the given path with default pool sizing.
    ///
    /// Schema initialization failure here is fatal and propagates out.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DEFAULT_INITIAL_SIZE, DEFAULT_GROWTH)
    }

    /// Open with explicit pool sizing.
    pub fn open_with(path: &Path, pool_initial: usize, pool_growth: usize) -> Result<Self> {
        let pool = ConnectionPool::open(path, pool_initial, pool_growth)?;

        {
            let conn = pool.acquire()?;
            schema::run_migrations(&conn)?;
        }

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Shut the store down, draining the pool.
    ///
    /// `is_failure` rolls back instead of committing anything still open.
    pub fn close(self, is_failure: bool) -> Result<()> {
        self.pool.drain_all(is_failure)
    }

    // ============================================
    // File operations
    // ============================================

    /// Store a new file, returning its engine-assigned id.
    ///
    /// Name and extension are split from the basename of `filename`; the
    /// content blob is stored as-is.
    pub fn add_file(&self, filename: &str, content: &[u8]) -> Result<i64> {
        let (name, ext) = split_filename(filename);

        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO files (name, ext, content) VALUES (?1, ?2, ?3)",
            params![name, ext, content],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(id, name = %name, bytes = content.len(), "Stored file");
        Ok(id)
    }

    /// Fetch a file by id, content included. `Ok(None)` if absent.
    pub fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT id, name, ext, content FROM files WHERE id = ?",
            [id],
            Self::row_to_file,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Replace a file's name, extension, and content together.
    pub fn update_file(&self, id: i64, filename: &str, content: &[u8]) -> Result<()> {
        let (name, ext) = split_filename(filename);

        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE files SET name = ?1, ext = ?2, content = ?3 WHERE id = ?4",
            params![name, ext, content, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound { entity: "file", id });
        }
        tx.commit()?;

        tracing::debug!(id, name = %name, bytes = content.len(), "Replaced file");
        Ok(())
    }

    /// Rename a file. Extension and content are untouched.
    pub fn update_file_name(&self, id: i64, name: &str) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE files SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound { entity: "file", id });
        }
        tx.commit()?;

        tracing::debug!(id, name = %name, "Renamed file");
        Ok(())
    }

    /// Delete a file and its coordinate links in one transaction.
    pub fn delete_file(&self, id: i64) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM file_filters WHERE file_id = ?", [id])?;
        let changed = tx.execute("DELETE FROM files WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::NotFound { entity: "file", id });
        }
        tx.commit()?;

        tracing::debug!(id, "Deleted file");
        Ok(())
    }

    /// List all stored files without their content, ordered by id.
    pub fn list_files(&self) -> Result<Vec<FileSummary>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, ext, LENGTH(content) AS size_bytes FROM files ORDER BY id",
        )?;

        let files: Vec<FileSummary> = stmt
            .query_map([], |row| {
                Ok(FileSummary {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    ext: row.get("ext")?,
                    size_bytes: row.get("size_bytes")?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(files)
    }

    /// List all stored file ids, ordered.
    pub fn list_file_ids(&self) -> Result<Vec<i64>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare("SELECT id FROM files ORDER BY id")?;

        let ids: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(ids)
    }

    // ============================================
    // Filter operations
    // ============================================

    /// Store a new filter predicate, returning its id.
    ///
    /// `method` is stored verbatim; the vocabulary check happens in the
    /// filter engine when the filter is applied.
    pub fn add_filter(&self, method: &str, input: &str, enabled: bool) -> Result<i64> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO filters (method, input, enabled) VALUES (?1, ?2, ?3)",
            params![method, input, enabled],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(id, method, "Stored filter");
        Ok(id)
    }

    /// Fetch a filter by id. `Ok(None)` if absent.
    pub fn get_filter(&self, id: i64) -> Result<Option<FilterRecord>> {
        let conn = self.pool.acquire()?;
        conn.query_row(
            "SELECT id, method, input, enabled FROM filters WHERE id = ?",
            [id],
            Self::row_to_filter,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Replace a filter's method, input, and enabled flag together.
    pub fn update_filter(&self, id: i64, method: &str, input: &str, enabled: bool) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE filters SET method = ?1, input = ?2, enabled = ?3 WHERE id = ?4",
            params![method, input, enabled, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound {
                entity: "filter",
                id,
            });
        }
        tx.commit()?;

        tracing::debug!(id, method, "Updated filter");
        Ok(())
    }

    /// Delete a filter and its coordinate links in one transaction.
    pub fn delete_filter(&self, id: i64) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM file_filters WHERE filter_id = ?", [id])?;
        let changed = tx.execute("DELETE FROM filters WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(Error::NotFound {
                entity: "filter",
                id,
            });
        }
        tx.commit()?;

        tracing::debug!(id, "Deleted filter");
        Ok(())
    }

    // ============================================
    // Coordinate links
    // ============================================

    /// Attach a filter to a (file, sheet, column) coordinate.
    ///
    /// Upsert keyed on (file_id, filter_id): linking the same filter to the
    /// same file again moves the link to the new coordinate instead of
    /// duplicating the row. Linking against a missing file or filter is a
    /// constraint violation.
    pub fn link_filter(&self, file_id: i64, filter_id: i64, sheet: i64, col: i64) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO file_filters (file_id, filter_id, sheet, col)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(file_id, filter_id) DO UPDATE SET
                sheet = excluded.sheet,
                col = excluded.col
            "#,
            params![file_id, filter_id, sheet, col],
        )?;
        tx.commit()?;

        tracing::debug!(file_id, filter_id, sheet, col, "Linked filter to coordinate");
        Ok(())
    }

    /// All filters registered at a coordinate, in link insertion order.
    pub fn filters_at(&self, file_id: i64, sheet: i64, col: i64) -> Result<Vec<FilterRecord>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT f.id, f.method, f.input, f.enabled
            FROM filters f
            JOIN file_filters ff ON ff.filter_id = f.id
            WHERE ff.file_id = ?1 AND ff.sheet = ?2 AND ff.col = ?3
            ORDER BY ff.rowid
            "#,
        )?;

        let filters: Vec<FilterRecord> = stmt
            .query_map(params![file_id, sheet, col], Self::row_to_filter)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(filters)
    }

    // ============================================
    // Row mappers
    // ============================================

    fn row_to_file(row: &Row) -> rusqlite::Result<FileRecord> {
        Ok(FileRecord {
            id: row.get("id")?,
            name: row.get("name")?,
            ext: row.get("ext")?,
            content: row.get("content")?,
        })
    }

    fn row_to_filter(row: &Row) -> rusqlite::Result<FilterRecord> {
        Ok(FilterRecord {
            id: row.get("id")?,
            method: row.get("method")?,
            input: row.get("input")?,
            enabled: row.get("enabled")?,
        })
    }
}
