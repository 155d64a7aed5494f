use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use uuid::Uuid;

use super::sink::{PageInsert, PageSink};
use crate::error::BoxError;
use crate::models::{FieldValue, TargetTable};

/// In-process stand-in for the target schema, used by dry runs.
///
/// Mirrors what the Postgres target enforces for this loader: primary-key conflict skip,
/// foreign keys of the link tables, and whole-page atomicity.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: HashMap<TargetTable, IndexMap<Uuid, Vec<FieldValue>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: TargetTable) -> usize {
        self.tables.get(&table).map_or(0, IndexMap::len)
    }

    pub fn contains(&self, table: TargetTable, id: Uuid) -> bool {
        self.tables
            .get(&table)
            .is_some_and(|rows| rows.contains_key(&id))
    }

    /// Stored rows of `table` in insertion order.
    pub fn rows(&self, table: TargetTable) -> Vec<&Vec<FieldValue>> {
        self.tables
            .get(&table)
            .map(|rows| rows.values().collect())
            .unwrap_or_default()
    }

    fn check_page(&self, page: &PageInsert<'_>) -> Result<Vec<Uuid>, BoxError> {
        let fields = page.table.fields();
        let mut ids = Vec::with_capacity(page.rows.len());
        for row in page.rows {
            if row.len() != fields.len() {
                return Err(format!(
                    "{}: row has {} values for {} columns",
                    page.table,
                    row.len(),
                    fields.len()
                )
                .into());
            }
            let id = row
                .first()
                .and_then(FieldValue::as_uuid)
                .ok_or_else(|| format!("{}: row without primary key", page.table))?;
            for (column, target) in page.table.foreign_keys() {
                let pos = fields
                    .iter()
                    .position(|f| f.name == *column)
                    .ok_or_else(|| format!("{}: unknown column {column}", page.table))?;
                let referenced = row[pos].as_uuid();
                if !referenced.is_some_and(|r| self.contains(*target, r)) {
                    return Err(format!(
                        "{}.{column} violates foreign key to {target}: {referenced:?}",
                        page.table
                    )
                    .into());
                }
            }
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl PageSink for MemorySink {
    async fn insert_page(&mut self, page: &PageInsert<'_>) -> Result<u64, BoxError> {
        let ids = self.check_page(page)?;
        let store = self.tables.entry(page.table).or_default();
        let mut inserted = 0;
        for (id, row) in ids.into_iter().zip(page.rows) {
            if !store.contains_key(&id) {
                store.insert(id, row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn film_row(id: Uuid) -> Vec<FieldValue> {
        let now = Utc::now();
        vec![
            FieldValue::Uuid(Some(id)),
            FieldValue::Text(Some("Alien".into())),
            FieldValue::Text(None),
            FieldValue::Date(None),
            FieldValue::Text(None),
            FieldValue::Text(None),
            FieldValue::Float(Some(8.5)),
            FieldValue::Text(Some("movie".into())),
            FieldValue::Timestamp(Some(now)),
            FieldValue::Timestamp(Some(now)),
        ]
    }

    fn page<'a>(table: TargetTable, rows: &'a [Vec<FieldValue>]) -> PageInsert<'a> {
        PageInsert {
            schema: "content",
            table,
            index: 0,
            rows,
        }
    }

    #[tokio::test]
    async fn existing_primary_keys_are_skipped_not_overwritten() {
        let mut sink = MemorySink::new();
        let id = Uuid::new_v4();
        let first = vec![film_row(id)];
        assert_eq!(sink.insert_page(&page(TargetTable::FilmWork, &first)).await.unwrap(), 1);

        let mut changed = film_row(id);
        changed[1] = FieldValue::Text(Some("Aliens".into()));
        let second = vec![changed, film_row(Uuid::new_v4())];
        assert_eq!(sink.insert_page(&page(TargetTable::FilmWork, &second)).await.unwrap(), 1);

        assert_eq!(sink.row_count(TargetTable::FilmWork), 2);
        assert_eq!(
            sink.rows(TargetTable::FilmWork)[0][1],
            FieldValue::Text(Some("Alien".into()))
        );
    }

    #[tokio::test]
    async fn dangling_links_reject_the_whole_page() {
        let mut sink = MemorySink::new();
        let film = Uuid::new_v4();
        sink.insert_page(&page(TargetTable::FilmWork, &[film_row(film)]))
            .await
            .unwrap();

        let link = vec![
            FieldValue::Uuid(Some(Uuid::new_v4())),
            FieldValue::Uuid(Some(film)),
            FieldValue::Uuid(Some(Uuid::new_v4())),
            FieldValue::Timestamp(Some(Utc::now())),
        ];
        let err = sink
            .insert_page(&page(TargetTable::GenreFilmWork, &[link]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("genre_id"));
        assert_eq!(sink.row_count(TargetTable::GenreFilmWork), 0);
    }
}
