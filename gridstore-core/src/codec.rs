//! Tabular codec boundary
//!
//! The storage layer never interprets file content; turning stored bytes into
//! sheets is a collaborator's job behind [`TabularCodec`]. Decoding failure
//! is reported as "no sheets", never as an error, so a corrupt upload reads
//! as an empty workbook rather than a hard failure.
//!
//! [`JsonCodec`] is the in-tree reference implementation for JSON-encoded
//! workbooks. Binary spreadsheet formats (xlsx, xls, csv) are decoded by
//! external collaborators implementing the same trait.

use crate::types::{NamedSheet, Sheet};
use std::collections::BTreeMap;

/// Decodes opaque file content into named sheets.
pub trait TabularCodec {
    /// Decode `content` into the workbook's sheets.
    ///
    /// `ext_hint` is the stored extension (leading dot included) captured at
    /// upload time. Returns an empty list when the content cannot be decoded
    /// or the codec does not handle the format.
    fn decode(&self, content: &[u8], ext_hint: Option<&str>) -> Vec<NamedSheet>;
}

/// Reference codec for JSON workbooks.
///
/// Expected shape: a map from sheet name to `{"columns": [...], "rows":
/// [[...], ...]}`. Sheets come back in name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl TabularCodec for JsonCodec {
    fn decode(&self, content: &[u8], ext_hint: Option<&str>) -> Vec<NamedSheet> {
        if let Some(ext) = ext_hint {
            let ext = ext.strip_prefix('.').unwrap_or(ext);
            if !ext.eq_ignore_ascii_case("json") {
                return Vec::new();
            }
        }

        match serde_json::from_slice::<BTreeMap<String, Sheet>>(content) {
            Ok(workbook) => workbook
                .into_iter()
                .map(|(name, sheet)| NamedSheet { name, sheet })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode workbook, reporting no sheets");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WORKBOOK: &str = r#"
    {
        "Summary": {
            "columns": ["name", "status"],
            "rows": [["alpha", "active"], ["beta", "inactive"]]
        },
        "Totals": {
            "columns": ["qty"],
            "rows": [[3]]
        }
    }
    "#;

    #[test]
    fn test_decode_workbook() {
        let sheets = JsonCodec.decode(WORKBOOK.as_bytes(), Some(".json"));

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Summary");
        assert_eq!(sheets[0].sheet.columns, vec!["name", "status"]);
        assert_eq!(sheets[0].sheet.rows[1][1], json!("inactive"));
        assert_eq!(sheets[1].name, "Totals");
    }

    #[test]
    fn test_garbage_decodes_to_no_sheets() {
        assert!(JsonCodec.decode(b"\x00\x01 not json", Some(".json")).is_empty());
        assert!(JsonCodec.decode(b"[1, 2, 3]", Some(".json")).is_empty());
    }

    #[test]
    fn test_wrong_extension_is_not_handled() {
        assert!(JsonCodec.decode(WORKBOOK.as_bytes(), Some(".xlsx")).is_empty());
    }

    #[test]
    fn test_no_hint_decodes_by_content() {
        let sheets = JsonCodec.decode(WORKBOOK.as_bytes(), None);
        assert_eq!(sheets.len(), 2);
    }

    #[test]
    fn test_rows_default_to_empty() {
        let sheets = JsonCodec.decode(br#"{"S": {"columns": ["a"]}}"#, None);
        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].sheet.rows.is_empty());
    }
}
