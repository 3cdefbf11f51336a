//! Core domain types for gridstore
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **File** | An uploaded spreadsheet stored as an opaque blob; never interpreted by the storage layer |
//! | **Filter** | A reusable column predicate: a method (exact/contains/not-contains/regex) plus an input string |
//! | **Coordinate** | The (file, sheet index, column index) triple a filter is attached to |
//! | **Relation** | The `file_filters` row recording which filter applies at which coordinate |
//! | **Sheet** | One decoded tab of a workbook: named columns over rows of JSON cells |
//!
//! Filters are stored and linked independently: a Filter row carries only the
//! predicate, a relation row pins it to a coordinate. The `method` string is
//! deliberately *not* validated at storage time; the filter engine checks it
//! against the vocabulary when the filter is applied.

use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================
// Stored records
// ============================================

/// A stored file, content included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Engine-assigned id, stable for the file's lifetime and never reused
    pub id: i64,
    /// User-editable display name (without extension)
    pub name: String,
    /// Extension captured at upload time, leading dot included ("" if none)
    pub ext: String,
    /// Opaque binary payload
    #[serde(skip_serializing, default)]
    pub content: Vec<u8>,
}

/// File listing entry without the content payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    /// Engine-assigned id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Extension, leading dot included
    pub ext: String,
    /// Size of the stored content in bytes
    pub size_bytes: i64,
}

/// A stored filter predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRecord {
    /// Engine-assigned id
    pub id: i64,
    /// Predicate method name; validated by the filter engine, not here
    pub method: String,
    /// Pattern or value the method evaluates against
    pub input: String,
    /// Disabled filters are skipped at apply time
    pub enabled: bool,
}

impl FilterRecord {
    /// Turn this record into an applicable spec pinned to a column.
    pub fn spec_at(&self, column: usize) -> FilterSpec {
        FilterSpec {
            method: self.method.clone(),
            input: self.input.clone(),
            column,
            enabled: self.enabled,
        }
    }
}

/// A filter ready for application: the stored predicate plus the positional
/// column it targets. The column is resolved against the sheet header at
/// apply time, not at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Predicate method name (see [`crate::filter::FilterMethod`])
    pub method: String,
    /// Pattern or value string
    pub input: String,
    /// Zero-based column index into the sheet header
    pub column: usize,
    /// Skipped entirely when false
    pub enabled: bool,
}

// ============================================
// Tabular data
// ============================================

/// One decoded sheet: a header of column names over rows of JSON cells.
///
/// Rows may be ragged; a missing cell reads as an empty string during
/// filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// Column names, in sheet order
    pub columns: Vec<String>,
    /// Row-major cell data
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl Sheet {
    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the header.
    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// A sheet together with its workbook tab name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSheet {
    /// Tab name from the workbook
    pub name: String,
    /// The decoded sheet
    pub sheet: Sheet,
}

// ============================================
// Filename handling
// ============================================

/// Split an uploaded filename into (name, extension).
///
/// Only the basename of the supplied path is considered. The extension keeps
/// its leading dot; a name with no dot, or a leading-dot name like
/// `.gitignore`, yields an empty extension.
pub fn split_filename(filename: &str) -> (String, String) {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    match base.rfind('.') {
        Some(idx) if idx > 0 => (base[..idx].to_string(), base[idx..].to_string()),
        _ => (base.to_string(), String::new()),
    }
}
