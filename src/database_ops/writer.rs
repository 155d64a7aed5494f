use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::sink::{PageInsert, PageSink};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{EtlError, EtlResult};
use crate::models::{EntityBatch, FieldValue, TargetTable};
use crate::util::progress::Progress;

/// Postgres refuses statements with more bind parameters than this.
pub const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: TargetTable,
    pub rows: usize,
    pub pages: usize,
    pub inserted: u64,
    /// Rows whose primary key was already present.
    pub skipped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub tables: Vec<TableReport>,
}

impl WriteReport {
    pub fn inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.tables.iter().map(|t| t.skipped).sum()
    }

    pub fn table(&self, table: TargetTable) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Pages entity collections into conflict-skipping bulk inserts.
pub struct BatchWriter<'s, S: PageSink> {
    sink: &'s mut S,
    schema: String,
    page_size: usize,
}

impl<'s, S: PageSink> BatchWriter<'s, S> {
    pub fn new(sink: &'s mut S, schema: impl Into<String>, page_size: usize) -> Self {
        let page_size = if page_size == 0 {
            warn!("page size 0 requested; using {DEFAULT_PAGE_SIZE}");
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        Self {
            sink,
            schema: schema.into(),
            page_size,
        }
    }

    /// Rows per page for `table`: the configured size, capped by the bind-parameter limit.
    pub fn page_size_for(&self, table: TargetTable) -> usize {
        let cap = MAX_BIND_PARAMS / table.fields().len();
        self.page_size.min(cap)
    }

    /// Writes every table of `order`, pages in sequence; stops at the first failing page.
    #[instrument(skip_all, fields(schema = %self.schema, page_size = self.page_size))]
    pub async fn save(&mut self, batch: &EntityBatch, order: &[TargetTable]) -> EtlResult<WriteReport> {
        let mut report = WriteReport::default();
        for &table in order {
            let rows = batch.rows(table);
            report.tables.push(self.save_table(table, &rows).await?);
        }
        info!(
            inserted = report.inserted(),
            skipped = report.skipped(),
            "all tables written"
        );
        Ok(report)
    }

    async fn save_table(&mut self, table: TargetTable, rows: &[Vec<FieldValue>]) -> EtlResult<TableReport> {
        let size = self.page_size_for(table);
        if size < self.page_size {
            warn!(%table, requested = self.page_size, size, "page size capped by bind-parameter limit");
        }
        if let Err((row, reason)) = check_rows(table, rows) {
            return Err(EtlError::SinkWriteError {
                table: table.name(),
                page: row / size,
                source: reason.into(),
            });
        }
        let mut progress = Progress::new(table.name(), Some(rows.len()));
        let mut out = TableReport {
            table,
            rows: rows.len(),
            pages: 0,
            inserted: 0,
            skipped: 0,
        };

        for (index, chunk) in rows.chunks(size).enumerate() {
            let page = PageInsert {
                schema: &self.schema,
                table,
                index,
                rows: chunk,
            };
            let inserted = self
                .sink
                .insert_page(&page)
                .await
                .map_err(|source| EtlError::SinkWriteError {
                    table: table.name(),
                    page: index,
                    source,
                })?;
            let skipped = (chunk.len() as u64).saturating_sub(inserted);
            debug!(%table, page = index, rows = chunk.len(), inserted, skipped, "page written");
            out.pages += 1;
            out.inserted += inserted;
            out.skipped += skipped;
            progress.tick(chunk.len());
        }
        progress.finish();
        info!(%table, rows = out.rows, pages = out.pages, inserted = out.inserted, skipped = out.skipped, "table written");
        Ok(out)
    }
}

/// Holds every row of `table` against its field table: arity, value type and nullability.
/// Returns the index of the first offending row and why.
fn check_rows(table: TargetTable, rows: &[Vec<FieldValue>]) -> Result<(), (usize, String)> {
    let fields = table.fields();
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != fields.len() {
            return Err((
                idx,
                format!("row {idx} has {} values for {} columns", row.len(), fields.len()),
            ));
        }
        for (value, spec) in row.iter().zip(fields) {
            if !value.fits(spec.ty) {
                return Err((idx, format!("row {idx}: {} cannot hold {value:?}", spec.name)));
            }
            if !spec.nullable && value.is_null() {
                return Err((idx, format!("row {idx}: {} must not be null", spec.name)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::MemorySink;
    use crate::error::BoxError;
    use crate::models::{Genre, WRITE_ORDER};
    use async_trait::async_trait;
    use chrono::Utc;

    fn genres(n: usize) -> EntityBatch {
        let now = Utc::now();
        EntityBatch {
            genres: (0..n)
                .map(|i| Genre {
                    id: crate::normalization::identity::genre_id(&format!("g{i}")),
                    name: format!("g{i}"),
                    description: None,
                    created_at: now,
                    updated_at: now,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Records page sizes and fails on the configured page of one table.
    #[derive(Default)]
    struct RecordingSink {
        pages: Vec<(TargetTable, usize, usize)>,
        fail_on: Option<(TargetTable, usize)>,
    }

    #[async_trait]
    impl PageSink for RecordingSink {
        async fn insert_page(&mut self, page: &PageInsert<'_>) -> Result<u64, BoxError> {
            if self.fail_on == Some((page.table, page.index)) {
                return Err("connection reset".into());
            }
            self.pages.push((page.table, page.index, page.rows.len()));
            Ok(page.rows.len() as u64)
        }
    }

    #[tokio::test]
    async fn rows_are_split_into_bounded_pages() {
        let mut sink = RecordingSink::default();
        let report = BatchWriter::new(&mut sink, "content", 2)
            .save(&genres(5), &WRITE_ORDER)
            .await
            .unwrap();
        let genre_pages: Vec<usize> = sink
            .pages
            .iter()
            .filter(|(t, _, _)| *t == TargetTable::Genre)
            .map(|(_, _, n)| *n)
            .collect();
        assert_eq!(genre_pages, vec![2, 2, 1]);
        let genre = report.table(TargetTable::Genre).unwrap();
        assert_eq!((genre.rows, genre.pages, genre.inserted), (5, 3, 5));
        // empty collections produce no statements
        assert_eq!(report.table(TargetTable::FilmWork).unwrap().pages, 0);
    }

    #[tokio::test]
    async fn failing_page_names_table_and_page_and_stops() {
        let mut sink = RecordingSink {
            fail_on: Some((TargetTable::Genre, 1)),
            ..Default::default()
        };
        let err = BatchWriter::new(&mut sink, "content", 2)
            .save(&genres(5), &WRITE_ORDER)
            .await
            .unwrap_err();
        match err {
            EtlError::SinkWriteError { table, page, .. } => {
                assert_eq!(table, "genre");
                assert_eq!(page, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(sink.pages.len(), 1);
        assert!(sink.pages.iter().all(|(t, _, _)| *t == TargetTable::Genre));
    }

    #[tokio::test]
    async fn rerun_skips_everything() {
        let mut sink = MemorySink::new();
        let batch = genres(3);
        let first = BatchWriter::new(&mut sink, "content", 500)
            .save(&batch, &WRITE_ORDER)
            .await
            .unwrap();
        let second = BatchWriter::new(&mut sink, "content", 500)
            .save(&batch, &WRITE_ORDER)
            .await
            .unwrap();
        assert_eq!((first.inserted(), first.skipped()), (3, 0));
        assert_eq!((second.inserted(), second.skipped()), (0, 3));
        assert_eq!(sink.row_count(TargetTable::Genre), 3);
    }

    #[tokio::test]
    async fn rows_breaking_the_field_table_never_reach_the_sink() {
        let mut sink = RecordingSink::default();
        let mut rows = genres(3).rows(TargetTable::Genre);
        rows[2][1] = FieldValue::Text(None);
        let err = BatchWriter::new(&mut sink, "content", 2)
            .save_table(TargetTable::Genre, &rows)
            .await
            .unwrap_err();
        match err {
            EtlError::SinkWriteError { table, page, source } => {
                assert_eq!(table, "genre");
                assert_eq!(page, 1);
                assert!(source.to_string().contains("name must not be null"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(sink.pages.is_empty());
    }

    #[test]
    fn field_table_rejects_wrong_types_and_unknown_roles() {
        let now = Utc::now();
        let link = |role: &str| {
            vec![
                FieldValue::Uuid(Some(uuid::Uuid::new_v4())),
                FieldValue::Uuid(Some(uuid::Uuid::new_v4())),
                FieldValue::Uuid(Some(uuid::Uuid::new_v4())),
                FieldValue::Text(Some(role.to_string())),
                FieldValue::Timestamp(Some(now)),
            ]
        };
        assert!(check_rows(TargetTable::PersonFilmWork, &[link("director")]).is_ok());

        let (row, reason) =
            check_rows(TargetTable::PersonFilmWork, &[link("actor"), link("producer")]).unwrap_err();
        assert_eq!(row, 1);
        assert!(reason.contains("role"));

        let mut wrong = link("actor");
        wrong[1] = FieldValue::Float(Some(1.0));
        assert!(check_rows(TargetTable::PersonFilmWork, &[wrong]).is_err());
        assert!(check_rows(TargetTable::PersonFilmWork, &[link("actor")[..4].to_vec()]).is_err());
    }

    #[test]
    fn page_size_respects_bind_limit() {
        let mut sink = MemorySink::new();
        let writer = BatchWriter::new(&mut sink, "content", 100_000);
        assert_eq!(writer.page_size_for(TargetTable::FilmWork), MAX_BIND_PARAMS / 10);
        assert_eq!(writer.page_size_for(TargetTable::GenreFilmWork), MAX_BIND_PARAMS / 4);
    }
}
