use async_trait::async_trait;

use crate::error::BoxError;
use crate::models::{FieldValue, TargetTable};

/// One bulk insert: a slice of rows of one table, columns per `table.fields()`.
#[derive(Debug, Clone, Copy)]
pub struct PageInsert<'a> {
    pub schema: &'a str,
    pub table: TargetTable,
    /// Zero-based page index within the table.
    pub index: usize,
    pub rows: &'a [Vec<FieldValue>],
}

/// Destination of pages. Implementations insert a page as a unit and skip rows whose primary
/// key already exists; they never update existing rows.
#[async_trait]
pub trait PageSink: Send {
    /// Returns the number of rows that were actually new.
    async fn insert_page(&mut self, page: &PageInsert<'_>) -> Result<u64, BoxError>;
}
