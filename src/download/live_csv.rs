//! Streaming CSV row iterator over a live response body (§4.8).
//!
//! Alternative to the file-backed reader in [`super::csv_file`]: consumes
//! lines as they arrive, buffering short lines to reassemble quoted fields
//! that embed newlines.

use crate::bom::detect_bom_bytes;
use crate::error::{FortifiedError, Result};

/// Feed lines in one at a time; get back zero-or-more completed rows as a
/// header-keyed mapping. Owns no I/O itself — the caller supplies lines from
/// wherever the response body comes from (this keeps it testable without a
/// live connection).
pub struct LiveCsvRows {
    delimiter: char,
    header: Option<Vec<String>>,
    pending: Option<String>,
}

impl LiveCsvRows {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            header: None,
            pending: None,
        }
    }

    fn split(&self, line: &str) -> Vec<String> {
        line.split(self.delimiter)
            .map(|f| f.trim().trim_matches('"').to_string())
            .collect()
    }

    /// Feed one physical line (without its trailing newline). Returns
    /// `Some(row)` once a complete logical row (continuation-resolved) is
    /// available, `None` while still buffering a continuation, or an error
    /// when the final field count mismatches the header (`REQ_ERR_UNEXPECTED_VALUE`).
    pub fn feed(&mut self, line: &str) -> Result<Option<std::collections::BTreeMap<String, String>>> {
        if self.header.is_none() {
            let info = detect_bom_bytes(line.as_bytes());
            let stripped = std::str::from_utf8(&line.as_bytes()[info.bom_len..]).unwrap_or(line);
            self.header = Some(self.split(stripped));
            return Ok(None);
        }

        let header = self.header.as_ref().unwrap();
        let combined = match self.pending.take() {
            Some(prev) => format!("{prev}\n{line}"),
            None => line.to_string(),
        };

        if combined.trim().is_empty() {
            return Ok(None);
        }

        let fields = self.split(&combined);
        if fields.len() < header.len() {
            self.pending = Some(combined);
            return Ok(None);
        }

        if fields.len() != header.len() {
            return Err(FortifiedError::unexpected_value(format!(
                "expected {} fields, got {}",
                header.len(),
                fields.len()
            )));
        }

        Ok(Some(header.iter().cloned().zip(fields).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_rows() {
        let mut rows = LiveCsvRows::new(',');
        assert!(rows.feed("a,b").unwrap().is_none());
        let row = rows.feed("1,2").unwrap().unwrap();
        assert_eq!(row["a"], "1");
        assert_eq!(row["b"], "2");
    }

    #[test]
    fn embedded_newline_continuation() {
        let mut rows = LiveCsvRows::new(',');
        rows.feed("a,b").unwrap();
        assert!(rows.feed("\"hello").unwrap().is_none());
        let row = rows.feed("world\",42").unwrap().unwrap();
        assert_eq!(row["a"], "hello\nworld");
        assert_eq!(row["b"], "42");
    }

    #[test]
    fn field_count_mismatch_after_continuation_errors() {
        let mut rows = LiveCsvRows::new(',');
        rows.feed("a,b").unwrap();
        let err = rows.feed("1,2,3").unwrap_err();
        assert_eq!(err.code().0, 604);
    }

    #[test]
    fn leading_utf8_bom_is_stripped_from_header() {
        let mut rows = LiveCsvRows::new(',');
        let header_line = "\u{feff}a,b";
        assert!(rows.feed(header_line).unwrap().is_none());
        let row = rows.feed("1,2").unwrap().unwrap();
        assert_eq!(row["a"], "1");
        assert_eq!(row["b"], "2");
        assert!(!row.contains_key("\u{feff}a"));
    }
}
