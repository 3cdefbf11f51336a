//! # gridstore-core
//!
//! Core library for gridstore - a vault for spreadsheet files with reusable
//! column filters.
//!
//! This library provides:
//! - A SQLite storage engine for files, filters, and their coordinate links
//! - A growing connection pool with scoped checkouts
//! - A pure filter-application engine over decoded sheets
//! - The tabular codec boundary and a JSON reference codec
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Files are stored as opaque blobs; a Filter is a reusable column predicate;
//! a relation row pins a filter to a (file, sheet, column) coordinate. A
//! caller reads a file's bytes, decodes them through a [`TabularCodec`],
//! fetches the filters registered at each coordinate, and applies them with
//! [`apply_filters`] - the stored sheet data itself is never touched.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gridstore_core::{apply_filters, Config, JsonCodec, Store, TabularCodec};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = Store::open(&Config::database_path()).expect("failed to open store");
//!
//! let id = store.add_file("report.json", b"{}").expect("failed to store file");
//! let file = store.get_file(id).expect("query failed").expect("file missing");
//!
//! for named in JsonCodec.decode(&file.content, Some(&file.ext)) {
//!     let specs: Vec<_> = (0..named.sheet.width())
//!         .flat_map(|col| {
//!             let filters = store.filters_at(id, 0, col as i64).unwrap_or_default();
//!             filters.into_iter().map(move |f| f.spec_at(col)).collect::<Vec<_>>()
//!         })
//!         .collect();
//!     let filtered = apply_filters(&named.sheet, &specs).expect("bad filter");
//!     println!("{}: {} rows", named.name, filtered.row_count());
//! }
//! ```

// Re-export commonly used items at the crate root
pub use codec::{JsonCodec, TabularCodec};
pub use config::Config;
pub use db::{ConnectionPool, PooledConnection, Store};
pub use error::{Error, Result};
pub use filter::{apply_filters, cell_text, ApplyError, FilterMethod};
pub use types::*;

// Public modules
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod logging;
pub mod types;
