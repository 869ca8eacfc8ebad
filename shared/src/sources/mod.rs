//! Loaders for the three tabular snapshots feeding the reconciliation engine
//!
//! Every loader reads delimited text, resolves its columns by header name and
//! normalizes rows one at a time. A row that fails normalization is dropped
//! and counted in the [`LoadReport`]; only a structurally unreadable file is
//! an error.

pub mod catalog;
pub mod history;
pub mod warehouse;

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

pub use catalog::{CatalogEntry, CatalogIndex, CatalogQuery, ProductSummary};
pub use history::{HistoricalMetric, HistoryIndex};
pub use warehouse::WarehouseSnapshot;

/// Which snapshot a load concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Catalog,
    History,
    Warehouse,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Catalog => f.write_str("catalog"),
            SourceKind::History => f.write_str("history"),
            SourceKind::Warehouse => f.write_str("warehouse"),
        }
    }
}

/// A snapshot file that could not be read as a whole
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {kind} snapshot: {error}")]
    Io {
        kind: SourceKind,
        #[source]
        error: std::io::Error,
    },

    #[error("{kind} snapshot is missing required column `{column}`")]
    MissingColumn { kind: SourceKind, column: String },

    #[error("{kind} snapshot is unreadable: {reason}")]
    Malformed { kind: SourceKind, reason: String },

    #[error("{kind} snapshot has no valid rows ({rows_read} rows read)")]
    NoValidRows { kind: SourceKind, rows_read: usize },
}

impl SourceError {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceError::Io { kind, .. }
            | SourceError::MissingColumn { kind, .. }
            | SourceError::Malformed { kind, .. }
            | SourceError::NoValidRows { kind, .. } => *kind,
        }
    }
}

/// Row accounting for one snapshot load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source: SourceKind,
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
}

impl LoadReport {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            rows_read: 0,
            rows_loaded: 0,
            rows_skipped: 0,
        }
    }

    fn skip(&mut self, row: usize, reason: &str) {
        self.rows_skipped += 1;
        tracing::debug!(source = %self.source, row, reason, "snapshot row skipped");
    }

    /// A file with rows of which none survived is unusable
    fn ensure_usable(self) -> Result<Self, SourceError> {
        if self.rows_read > 0 && self.rows_read == self.rows_skipped {
            return Err(SourceError::NoValidRows {
                kind: self.source,
                rows_read: self.rows_read,
            });
        }
        Ok(self)
    }
}

/// CSV dialect of the snapshot exports
#[derive(Debug, Clone, Copy)]
pub struct SourceOptions {
    pub delimiter: u8,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { delimiter: b';' }
    }
}

/// Open a snapshot file for one of the loaders
pub(crate) fn open(kind: SourceKind, path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|error| SourceError::Io { kind, error })
}

/// Header-resolved reader over a snapshot.
///
/// Cells are decoded lossily so Latin-1 exports still load; the affected
/// characters only appear in descriptions.
pub(crate) struct SnapshotReader<R: Read> {
    kind: SourceKind,
    reader: csv::Reader<R>,
    columns: Vec<usize>,
}

impl<R: Read> SnapshotReader<R> {
    pub(crate) fn new(
        kind: SourceKind,
        input: R,
        options: SourceOptions,
        required: &[&str],
    ) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .byte_headers()
            .map_err(|e| SourceError::Malformed {
                kind,
                reason: e.to_string(),
            })?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_lowercase()
            })
            .collect();

        let columns = required
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == &name.to_lowercase())
                    .ok_or_else(|| SourceError::MissingColumn {
                        kind,
                        column: (*name).to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kind,
            reader,
            columns,
        })
    }

    /// Visit every data row with its cells in `required` order.
    ///
    /// The visitor returns `Err(reason)` to skip a row.
    pub(crate) fn for_each_row<F>(mut self, mut visit: F) -> Result<LoadReport, SourceError>
    where
        F: FnMut(&[String]) -> Result<(), &'static str>,
    {
        let mut report = LoadReport::new(self.kind);
        let mut record = csv::ByteRecord::new();
        let mut cells = Vec::with_capacity(self.columns.len());

        loop {
            match self.reader.read_byte_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.is_io_error() => {
                    return Err(SourceError::Malformed {
                        kind: self.kind,
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    report.rows_read += 1;
                    report.skip(report.rows_read, &e.to_string());
                    continue;
                }
            }
            report.rows_read += 1;

            if record.iter().all(|cell| cell.is_empty()) {
                report.skip(report.rows_read, "blank row");
                continue;
            }

            cells.clear();
            cells.extend(self.columns.iter().map(|&idx| {
                record
                    .get(idx)
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .unwrap_or_default()
            }));

            match visit(&cells) {
                Ok(()) => report.rows_loaded += 1,
                Err(reason) => report.skip(report.rows_read, reason),
            }
        }

        report.ensure_usable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_hard_failure() {
        let data = "CODIGOINT;LOJA\n1;1\n";
        let result = SnapshotReader::new(
            SourceKind::Catalog,
            data.as_bytes(),
            SourceOptions::default(),
            &["CODIGOINT", "DESCRICAO"],
        );
        assert!(matches!(
            result,
            Err(SourceError::MissingColumn { column, .. }) if column == "DESCRICAO"
        ));
    }

    #[test]
    fn test_headers_match_case_insensitively() {
        let data = "\u{feff}codigoint ; Loja\n1;1\n";
        let reader = SnapshotReader::new(
            SourceKind::Catalog,
            data.as_bytes(),
            SourceOptions::default(),
            &["LOJA", "CODIGOINT"],
        )
        .unwrap();

        let mut seen = Vec::new();
        let report = reader
            .for_each_row(|cells| {
                seen.push(cells.to_vec());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![vec!["1".to_string(), "1".to_string()]]);
        assert_eq!(report.rows_loaded, 1);
    }

    #[test]
    fn test_all_rows_rejected_is_hard_failure() {
        let data = "A\nx\ny\n";
        let reader = SnapshotReader::new(
            SourceKind::Warehouse,
            data.as_bytes(),
            SourceOptions::default(),
            &["A"],
        )
        .unwrap();

        let result = reader.for_each_row(|_| Err("bad"));
        assert!(matches!(
            result,
            Err(SourceError::NoValidRows { rows_read: 2, .. })
        ));
    }

    #[test]
    fn test_empty_file_is_not_an_error() {
        let reader = SnapshotReader::new(
            SourceKind::Warehouse,
            "A\n".as_bytes(),
            SourceOptions::default(),
            &["A"],
        )
        .unwrap();
        let report = reader.for_each_row(|_| Ok(())).unwrap();
        assert_eq!(report.rows_read, 0);
    }
}
