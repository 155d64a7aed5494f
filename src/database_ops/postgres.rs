use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use super::sink::{PageInsert, PageSink};
use crate::error::BoxError;
use crate::models::FieldValue;

/// Writes pages through a borrowed connection (usually the driver's open transaction).
/// Commit and rollback stay with the owner of the connection.
pub struct PostgresSink<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PostgresSink<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PageSink for PostgresSink<'_> {
    async fn insert_page(&mut self, page: &PageInsert<'_>) -> Result<u64, BoxError> {
        if page.rows.is_empty() {
            return Ok(0);
        }
        let mut qb = build_insert(page);
        let done = qb
            .build()
            .persistent(false)
            .execute(&mut *self.conn)
            .await?;
        Ok(done.rows_affected())
    }
}

/// `INSERT INTO "<schema>"."<table>" (<columns>) VALUES (...), ... ON CONFLICT ("id") DO NOTHING`
/// with every value as a bind parameter. Absent values bind as typed NULLs.
pub fn build_insert(page: &PageInsert<'_>) -> QueryBuilder<'static, Postgres> {
    let columns = page
        .table
        .fields()
        .iter()
        .map(|f| format!("\"{}\"", f.name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut qb: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
        "INSERT INTO \"{}\".\"{}\" ({}) ",
        page.schema,
        page.table.name(),
        columns
    ));
    qb.push_values(page.rows.iter(), |mut b, row| {
        for value in row {
            match value {
                FieldValue::Uuid(v) => b.push_bind(*v),
                FieldValue::Text(v) => b.push_bind(v.clone()),
                FieldValue::Float(v) => b.push_bind(*v),
                FieldValue::Date(v) => b.push_bind(*v),
                FieldValue::Timestamp(v) => b.push_bind(*v),
            };
        }
    });
    // Conflict policy: primary key only. Existing rows are left untouched.
    qb.push(" ON CONFLICT (\"id\") DO NOTHING");
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetTable;
    use chrono::Utc;
    use uuid::Uuid;

    fn genre_row(name: &str) -> Vec<FieldValue> {
        let now = Utc::now();
        vec![
            FieldValue::Uuid(Some(Uuid::new_v4())),
            FieldValue::Text(Some(name.to_string())),
            FieldValue::Text(None),
            FieldValue::Timestamp(Some(now)),
            FieldValue::Timestamp(Some(now)),
        ]
    }

    #[test]
    fn insert_is_schema_qualified_and_conflict_skipping() {
        let rows = vec![genre_row("Action"), genre_row("Drama")];
        let page = PageInsert {
            schema: "content",
            table: TargetTable::Genre,
            index: 0,
            rows: &rows,
        };
        let qb = build_insert(&page);
        let sql = qb.sql();
        assert!(sql.starts_with(
            "INSERT INTO \"content\".\"genre\" (\"id\", \"name\", \"description\", \"created_at\", \"updated_at\") VALUES "
        ));
        assert!(sql.contains("($1, $2, $3, $4, $5)"));
        assert!(sql.contains("($6, $7, $8, $9, $10)"));
        assert!(sql.ends_with(" ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn values_never_appear_inline() {
        let rows = vec![genre_row("Schindler's List")];
        let page = PageInsert {
            schema: "content",
            table: TargetTable::Genre,
            index: 0,
            rows: &rows,
        };
        let qb = build_insert(&page);
        assert!(!qb.sql().contains("Schindler"));
    }
}
