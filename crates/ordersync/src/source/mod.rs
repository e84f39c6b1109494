//! Record sources
//!
//! - [`SqlSource`]: offset-paginated reader over a PostgreSQL query
//! - [`CsvFile`]: streaming reader over one CSV file, batched per file

pub mod csv;
pub mod sql;

use crate::error::Result;
use crate::record::Record;
use async_trait::async_trait;

pub use self::csv::{list_csv_files, CsvBatches, CsvFile};
pub use self::sql::SqlSource;

/// A paginated source of records in a stable order
///
/// `fetch` returns at most `limit` records starting at `offset`. An empty
/// batch means the source is exhausted; it is the only end-of-data signal.
#[async_trait]
pub trait RecordSource: Send {
    async fn fetch(&mut self, offset: u64, limit: u64) -> Result<Vec<Record>>;
}
