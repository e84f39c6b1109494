//! Streaming CSV source
//!
//! Each file's header row is its field list. Rows are read lazily and
//! grouped into batches; the last batch of a file may be short. Rows with
//! missing or extra columns are kept as-is. Cells are decoded as UTF-8 with
//! invalid sequences replaced by U+FFFD, so a stray byte never costs a row
//! its business key.

use crate::error::{Result, SyncError};
use crate::record::{CsvRecord, Record};
use crate::reporter::{Reporter, SyncEvent};
use ::csv::{ByteRecord, Reader, ReaderBuilder, Trim};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `.csv` files directly inside `dir`, sorted by path
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SyncError::io(dir, e))?.path();
        if path.is_file() && has_csv_extension(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn csv_error(path: &Path, source: ::csv::Error) -> SyncError {
    SyncError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn decode_cell(cell: &[u8]) -> String {
    String::from_utf8_lossy(cell).into_owned()
}

pub struct CsvFile {
    path: PathBuf,
    headers: Arc<[String]>,
    reader: Reader<File>,
    batch_size: usize,
}

impl CsvFile {
    /// Open `path` and read its header row
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(file);

        let headers: Vec<String> = reader
            .byte_headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(decode_cell)
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            headers: headers.into(),
            reader,
            batch_size: batch_size.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Lazily read the remaining rows in batches of the configured size
    pub fn batches(self, reporter: &dyn Reporter) -> CsvBatches<'_> {
        CsvBatches {
            file: self,
            reporter,
            row: ByteRecord::new(),
            finished: false,
        }
    }
}

/// Iterator over the batches of one file
///
/// Yields `Err` once on an I/O failure and then stops.
pub struct CsvBatches<'r> {
    file: CsvFile,
    reporter: &'r dyn Reporter,
    row: ByteRecord,
    finished: bool,
}

impl Iterator for CsvBatches<'_> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.file.batch_size);
        while batch.len() < self.file.batch_size {
            match self.file.reader.read_byte_record(&mut self.row) {
                Ok(true) => {
                    let line = self.row.position().map(|p| p.line());
                    let values = self.row.iter().map(decode_cell).collect();
                    batch.push(CsvRecord::new(self.file.headers.clone(), values, line).into());
                },
                Ok(false) => {
                    self.finished = true;
                    break;
                },
                Err(e) if e.is_io_error() => {
                    self.finished = true;
                    return Some(Err(csv_error(&self.file.path, e)));
                },
                Err(e) => {
                    self.reporter.report(SyncEvent::RowSkipped {
                        file: self.file.path.clone(),
                        line: e.position().map(|p| p.line()),
                        reason: e.to_string(),
                    });
                },
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}
