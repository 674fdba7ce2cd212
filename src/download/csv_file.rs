//! File-backed CSV row iteration (§4.7 step 7).
//!
//! `csv_skip_last_row` is a bare one-ahead buffer over any iterator —
//! deliberately not CSV-specific, matching
//! `pyfortified_requests/support/response/csv.py`'s `csv_skip_last_row`,
//! which is just `itertools.tee`-free lookahead.

use std::collections::BTreeMap;
use std::path::Path;

use crate::bom::remove_bom;
use crate::download::CsvOptions;
use crate::error::{FortifiedError, Result};

/// A single decoded CSV row: header name -> value, values stripped of
/// surrounding double quotes.
pub type CsvRow = BTreeMap<String, String>;

/// Skip the last item of any iterator, yielding the rest in original order.
/// `K` items in -> `K-1` items out.
pub fn csv_skip_last_row<I>(mut iter: I) -> impl Iterator<Item = I::Item>
where
    I: Iterator,
{
    let mut prev = iter.next();
    std::iter::from_fn(move || {
        let next = iter.next();
        match (prev.take(), next) {
            (Some(p), Some(n)) => {
                prev = Some(n);
                Some(p)
            }
            _ => None,
        }
    })
}

/// Read `path` (already BOM-stripped by the caller per §4.7 step 7) as CSV
/// per `opts`, returning fully materialized rows. A file-backed reader rather
/// than a true iterator, since the caller has already paid the cost of
/// writing the whole body to disk. Quoted-field parsing (including embedded
/// delimiters/newlines) is delegated to the `csv` crate rather than
/// hand-rolled splitting.
pub fn read_csv_rows(path: impl AsRef<Path>, opts: &CsvOptions) -> Result<Vec<CsvRow>> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| FortifiedError::software(format!("read_csv_rows: {e}")))?;
    let mut lines = contents.lines();

    if opts.read_first_row {
        let _report_name = lines.next();
    } else if opts.skip_first_row {
        let _ = lines.next();
    }

    let remainder = lines.collect::<Vec<_>>().join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(remainder.as_bytes());

    let mut records = reader.records();
    let file_header_record = records
        .next()
        .ok_or_else(|| FortifiedError::unexpected_value("CSV body has no header row"))?
        .map_err(|e| FortifiedError::unexpected_value(format!("CSV header parse failed: {e}")))?;
    let header = opts.header_override.clone().unwrap_or_else(|| {
        file_header_record.iter().map(|f| f.to_string()).collect()
    });

    let rows_iter = records.filter_map(|result| {
        let record = match result {
            Ok(record) if record.iter().all(|f| f.is_empty()) => return None,
            Ok(record) => record,
            Err(e) => {
                return Some(Err(FortifiedError::unexpected_value(format!(
                    "CSV row parse failed: {e}"
                ))))
            }
        };
        Some(Ok(header
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect::<CsvRow>()))
    });

    let rows: Result<Vec<CsvRow>> = if opts.skip_last_row {
        csv_skip_last_row(rows_iter).collect()
    } else {
        rows_iter.collect()
    };

    rows
}

/// Strip a BOM if present, writing a `_wo_bom.csv` sibling, and return the
/// path to read from (§4.7 step 7).
pub fn strip_bom_sibling(path: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    let sibling = path.with_file_name(format!(
        "{}_wo_bom.csv",
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("download")
    ));
    let info = remove_bom(path, &sibling)?;
    if info.bom_len > 0 {
        Ok(sibling)
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn csv_skip_last_row_drops_only_final_item() {
        let items = vec![1, 2, 3, 4];
        let kept: Vec<i32> = csv_skip_last_row(items.into_iter()).collect();
        assert_eq!(kept, vec![1, 2, 3]);
    }

    #[test]
    fn csv_skip_last_row_empty_iterator() {
        let items: Vec<i32> = vec![];
        let kept: Vec<i32> = csv_skip_last_row(items.into_iter()).collect();
        assert!(kept.is_empty());
    }

    #[test]
    fn csv_skip_last_row_single_item_yields_nothing() {
        let items = vec![42];
        let kept: Vec<i32> = csv_skip_last_row(items.into_iter()).collect();
        assert!(kept.is_empty());
    }

    #[test]
    fn read_csv_rows_with_skip_last() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "a,b\n1,2\n3,4\n").unwrap();
        f.flush().unwrap();

        let opts = CsvOptions {
            delimiter: b',',
            skip_last_row: true,
            ..CsvOptions::new()
        };
        let rows = read_csv_rows(f.path(), &opts).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], "1");
        assert_eq!(rows[0]["b"], "2");
    }

    #[test]
    fn read_csv_rows_honors_header_override() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "x,y\n1,2\n").unwrap();
        f.flush().unwrap();

        let opts = CsvOptions {
            delimiter: b',',
            header_override: Some(vec!["a".into(), "b".into()]),
            ..CsvOptions::new()
        };
        let rows = read_csv_rows(f.path(), &opts).unwrap();
        assert_eq!(rows[0]["a"], "1");
    }

    #[test]
    fn read_csv_rows_strips_quotes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "a,b\n\"1\",\"2\"\n").unwrap();
        f.flush().unwrap();
        let rows = read_csv_rows(f.path(), &CsvOptions::new()).unwrap();
        assert_eq!(rows[0]["a"], "1");
    }

    #[test]
    fn read_csv_rows_handles_embedded_delimiter_in_quotes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "a,b\n\"1,5\",\"2\"\n").unwrap();
        f.flush().unwrap();
        let rows = read_csv_rows(f.path(), &CsvOptions::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], "1,5");
        assert_eq!(rows[0]["b"], "2");
    }

    #[test]
    fn bom_gated_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.csv");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"a,b\n1,2\n3,4\n");
        std::fs::write(&path, &bytes).unwrap();

        let read_path = strip_bom_sibling(&path).unwrap();
        assert_ne!(read_path, path);

        let opts = CsvOptions {
            delimiter: b',',
            skip_last_row: true,
            ..CsvOptions::new()
        };
        let rows = read_csv_rows(&read_path, &opts).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["a"], "1");
        assert_eq!(rows[0]["b"], "2");
    }
}
