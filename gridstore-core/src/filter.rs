//! Filter application engine
//!
//! Pure function layer: applies an ordered list of [`FilterSpec`]s to a
//! [`Sheet`] and returns a filtered copy. Filters compose as a logical AND
//! by successive narrowing, so later filters can only remove rows. The input
//! sheet is never mutated.
//!
//! Unlike the storage layer, this module *does* validate the predicate
//! vocabulary: an unrecognized method aborts the whole application with
//! [`ApplyError::UnsupportedMethod`] instead of being skipped, because
//! silently ignoring a predicate would change the result without the
//! caller's knowledge.

use crate::types::{FilterSpec, Sheet};
use regex::Regex;
use thiserror::Error;

/// The fixed predicate vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    /// Cell text equals the input exactly
    Exact,
    /// Cell text contains the input as a substring
    Contains,
    /// Cell text does not contain the input
    NotContains,
    /// Cell text matches the input pattern, anchored at the start
    Regex,
}

impl FilterMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMethod::Exact => "exact",
            FilterMethod::Contains => "contains",
            FilterMethod::NotContains => "not-contains",
            FilterMethod::Regex => "regex",
        }
    }
}

impl std::str::FromStr for FilterMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(FilterMethod::Exact),
            "contains" => Ok(FilterMethod::Contains),
            "not-contains" => Ok(FilterMethod::NotContains),
            "regex" => Ok(FilterMethod::Regex),
            _ => Err(format!("unknown filter method: {}", s)),
        }
    }
}

/// Validation failure that aborts a filter application.
///
/// Deliberately a separate type from [`crate::Error`]: these must abort the
/// whole application rather than degrade into a partial result.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Method string outside the vocabulary
    #[error("unsupported filter method: {0:?}")]
    UnsupportedMethod(String),

    /// Positional column does not exist in the sheet header
    #[error("column {column} out of range for sheet with {width} column(s)")]
    ColumnOutOfRange { column: usize, width: usize },

    /// The regex method received a pattern that does not compile
    #[error("invalid filter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// Text a filter predicate sees for one cell.
///
/// String cells compare on their text, null as the empty string, everything
/// else on its compact JSON rendering.
pub fn cell_text(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Apply an ordered list of filter specs to a sheet, returning a fresh
/// filtered sheet.
///
/// Disabled specs are skipped. Each remaining spec narrows the surviving row
/// set in the order given; the column index is resolved against the sheet
/// header at apply time, so an index past the header width is a validation
/// failure. Rows shorter than the header read missing cells as empty strings.
pub fn apply_filters(sheet: &Sheet, specs: &[FilterSpec]) -> Result<Sheet, ApplyError> {
    let mut keep = vec![true; sheet.rows.len()];

    for spec in specs {
        if !spec.enabled {
            continue;
        }

        let method: FilterMethod = spec
            .method
            .parse()
            .map_err(|_| ApplyError::UnsupportedMethod(spec.method.clone()))?;

        // Positional coordinate resolved against the header now, not at
        // filter-creation time; schema drift between the two is the caller's
        // documented risk.
        let column_name = sheet
            .columns
            .get(spec.column)
            .ok_or(ApplyError::ColumnOutOfRange {
                column: spec.column,
                width: sheet.columns.len(),
            })?;
        tracing::trace!(
            method = method.as_str(),
            column = spec.column,
            column_name = %column_name,
            "Applying filter"
        );

        let predicate: Box<dyn Fn(&str) -> bool + '_> = match method {
            FilterMethod::Exact => Box::new(|text: &str| text == spec.input),
            FilterMethod::Contains => Box::new(|text: &str| text.contains(&spec.input)),
            FilterMethod::NotContains => Box::new(|text: &str| !text.contains(&spec.input)),
            FilterMethod::Regex => {
                // Anchor at the start of the cell text
                let re = Regex::new(&format!("^(?:{})", spec.input)).map_err(|e| {
                    ApplyError::InvalidPattern {
                        pattern: spec.input.clone(),
                        source: Box::new(e),
                    }
                })?;
                Box::new(move |text: &str| re.is_match(text))
            }
        };

        for (i, row) in sheet.rows.iter().enumerate() {
            if !keep[i] {
                continue;
            }
            let text = row.get(spec.column).map(cell_text).unwrap_or_default();
            if !predicate(&text) {
                keep[i] = false;
            }
        }
    }

    Ok(Sheet {
        columns: sheet.columns.clone(),
        rows: sheet
            .rows
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(row, _)| row.clone())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 3 rows, column "status" = [active, inactive, active]
    fn status_sheet() -> Sheet {
        Sheet {
            columns: vec!["name".to_string(), "status".to_string()],
            rows: vec![
                vec![json!("alpha"), json!("active")],
                vec![json!("beta"), json!("inactive")],
                vec![json!("gamma"), json!("active")],
            ],
        }
    }

    fn spec(method: &str, input: &str, column: usize, enabled: bool) -> FilterSpec {
        FilterSpec {
            method: method.to_string(),
            input: input.to_string(),
            column,
            enabled,
        }
    }

    #[test]
    fn test_exact_keeps_matching_rows() {
        let sheet = status_sheet();
        let out = apply_filters(&sheet, &[spec("exact", "active", 1, true)]).unwrap();

        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[0][0], json!("alpha"));
        assert_eq!(out.rows[1][0], json!("gamma"));
    }

    #[test]
    fn test_contains_after_exact_narrows_no_further() {
        let sheet = status_sheet();
        let out = apply_filters(
            &sheet,
            &[
                spec("exact", "active", 1, true),
                spec("contains", "act", 1, true),
            ],
        )
        .unwrap();

        // "act" is a substring of every surviving "active" cell
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn test_regex_anchored_at_start() {
        let sheet = status_sheet();
        let out = apply_filters(&sheet, &[spec("regex", "^in", 1, true)]).unwrap();

        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0][0], json!("beta"));

        // Without an explicit ^ the pattern is still anchored: "active"
        // contains "ctive" but does not start with it
        let out = apply_filters(&sheet, &[spec("regex", "ctive", 1, true)]).unwrap();
        assert_eq!(out.row_count(), 0);
    }

    #[test]
    fn test_not_contains() {
        let sheet = status_sheet();
        let out = apply_filters(&sheet, &[spec("not-contains", "in", 1, true)]).unwrap();

        assert_eq!(out.row_count(), 2);
        assert!(out.rows.iter().all(|r| r[1] == json!("active")));
    }

    #[test]
    fn test_composition_is_order_independent() {
        let sheet = status_sheet();
        let a = spec("contains", "act", 1, true);
        let b = spec("regex", "a", 0, true);

        let ab = apply_filters(&sheet, &[a.clone(), b.clone()]).unwrap();
        let ba = apply_filters(&sheet, &[b, a]).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_all_disabled_is_a_no_op() {
        let sheet = status_sheet();
        let out = apply_filters(
            &sheet,
            &[
                spec("exact", "nothing-matches-this", 1, false),
                spec("regex", "(((", 0, false),
            ],
        )
        .unwrap();

        assert_eq!(out, sheet);
    }

    #[test]
    fn test_input_sheet_is_not_mutated() {
        let sheet = status_sheet();
        let before = sheet.clone();
        let _ = apply_filters(&sheet, &[spec("exact", "active", 1, true)]).unwrap();
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_unknown_method_aborts() {
        let sheet = status_sheet();
        let err = apply_filters(&sheet, &[spec("fuzzy", "x", 0, true)]).unwrap_err();
        assert!(matches!(err, ApplyError::UnsupportedMethod(m) if m == "fuzzy"));
    }

    #[test]
    fn test_unknown_method_aborts_even_with_valid_filters_before_it() {
        let sheet = status_sheet();
        let err = apply_filters(
            &sheet,
            &[spec("exact", "active", 1, true), spec("fuzzy", "x", 0, true)],
        )
        .unwrap_err();
        assert!(matches!(err, ApplyError::UnsupportedMethod(_)));
    }

    #[test]
    fn test_disabled_unknown_method_is_skipped_before_validation() {
        // Skip-then-validate order: a disabled spec never reaches the
        // vocabulary check
        let sheet = status_sheet();
        let out = apply_filters(&sheet, &[spec("fuzzy", "x", 0, false)]).unwrap();
        assert_eq!(out.row_count(), 3);
    }

    #[test]
    fn test_column_out_of_range_aborts() {
        let sheet = status_sheet();
        let err = apply_filters(&sheet, &[spec("exact", "x", 9, true)]).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::ColumnOutOfRange { column: 9, width: 2 }
        ));
    }

    #[test]
    fn test_invalid_regex_aborts() {
        let sheet = status_sheet();
        let err = apply_filters(&sheet, &[spec("regex", "(((", 0, true)]).unwrap_err();
        assert!(matches!(err, ApplyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_non_string_cells_compare_on_rendering() {
        let sheet = Sheet {
            columns: vec!["qty".to_string()],
            rows: vec![vec![json!(10)], vec![json!(25)], vec![json!(null)]],
        };

        let out = apply_filters(&sheet, &[spec("exact", "25", 0, true)]).unwrap();
        assert_eq!(out.row_count(), 1);

        // Null renders as the empty string
        let out = apply_filters(&sheet, &[spec("exact", "", 0, true)]).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0][0], json!(null));
    }

    #[test]
    fn test_ragged_row_reads_missing_cell_as_empty() {
        let sheet = Sheet {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![json!("x"), json!("y")], vec![json!("x")]],
        };

        let out = apply_filters(&sheet, &[spec("contains", "y", 1, true)]).unwrap();
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_method_round_trip() {
        for name in ["exact", "contains", "not-contains", "regex"] {
            let method: FilterMethod = name.parse().unwrap();
            assert_eq!(method.as_str(), name);
        }
        assert!("EXACT".parse::<FilterMethod>().is_err());
    }
}
