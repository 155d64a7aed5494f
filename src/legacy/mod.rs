//! Legacy SQLite store: raw row model and the reader.
//!
//! Column contract of the legacy file (fixed, the loader relies on these names):
//!
//! | table          | columns                                                                 |
//! |----------------|-------------------------------------------------------------------------|
//! | `movies`       | `id`, `genre`, `director`, `writer`, `title`, `plot`, `imdb_rating`, `writers` |
//! | `actors`       | `id`, `name`                                                            |
//! | `writers`      | `id`, `name`                                                            |
//! | `movie_actors` | `movie_id`, `actor_id`                                                  |
//!
//! `genre` and `director` are comma separated; `writers` is a JSON array of `{"id": ..}` objects.
//! Other columns (e.g. `ratings`) may exist and are carried in the snapshot but ignored.
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{EtlError, EtlResult};

pub mod reader;

pub use reader::LegacyReader;

pub mod tables {
    pub const MOVIES: &str = "movies";
    pub const ACTORS: &str = "actors";
    pub const WRITERS: &str = "writers";
    pub const MOVIE_ACTORS: &str = "movie_actors";

    pub const MOVIES_COLUMNS: &[&str] = &[
        "id",
        "genre",
        "director",
        "writer",
        "title",
        "plot",
        "imdb_rating",
        "writers",
    ];
    pub const ROSTER_COLUMNS: &[&str] = &["id", "name"];
    pub const MOVIE_ACTORS_COLUMNS: &[&str] = &["movie_id", "actor_id"];
}

/// A value exactly as SQLite stored it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Text view for string-ish values; numbers render as decimal text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Integer(i) => Some(i.to_string()),
            RawValue::Real(f) => Some(f.to_string()),
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

static NULL: RawValue = RawValue::Null;

/// One legacy row, column name → value in the store's declared column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRow {
    values: IndexMap<String, RawValue>,
}

impl LegacyRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: RawValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: RawValue) {
        self.values.insert(column.into(), value);
    }

    /// Value of `column`, `Null` when the row has no such column.
    pub fn get(&self, column: &str) -> &RawValue {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<LegacyRow>,
}

impl LegacyTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Fails with `SourceUnavailable` when the table lacks any of `required`.
    pub fn require_columns(&self, required: &[&str]) -> EtlResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !self.columns.iter().any(|have| have == c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EtlError::SourceUnavailable {
                detail: format!("table '{}' lacks columns {:?}", self.name, missing),
                source: None,
            })
        }
    }
}

/// Every table of the legacy store, fully loaded.
#[derive(Debug, Clone, Default)]
pub struct LegacySnapshot {
    tables: HashMap<String, LegacyTable>,
}

impl LegacySnapshot {
    pub fn insert(&mut self, table: LegacyTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> EtlResult<&LegacyTable> {
        self.tables.get(name).ok_or_else(|| EtlError::SourceUnavailable {
            detail: format!("table '{name}' is missing from the legacy store"),
            source: None,
        })
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(|t| t.rows.len()).sum()
    }
}

/// Legacy-local identifier. Compared as trimmed text so integer and text storage agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegacyId(String);

impl LegacyId {
    pub fn from_raw(raw: &RawValue) -> Option<Self> {
        let text = match raw {
            RawValue::Real(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
            other => other.as_text()?,
        };
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let t = text.trim();
        if t.is_empty() {
            None
        } else {
            Some(Self(t.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ids_match_across_storage_classes() {
        assert_eq!(
            LegacyId::from_raw(&RawValue::Integer(7)),
            LegacyId::from_raw(&RawValue::Text(" 7 ".into()))
        );
        assert_eq!(
            LegacyId::from_raw(&RawValue::Real(7.0)),
            LegacyId::from_text("7")
        );
        assert_eq!(LegacyId::from_raw(&RawValue::Null), None);
        assert_eq!(LegacyId::from_raw(&RawValue::Text("  ".into())), None);
    }

    #[test]
    fn missing_columns_read_as_null() {
        let row = LegacyRow::new().with("id", RawValue::Integer(1));
        assert_eq!(row.get("id"), &RawValue::Integer(1));
        assert!(row.get("name").is_null());
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn snapshot_reports_missing_tables_and_columns() {
        let mut snap = LegacySnapshot::default();
        snap.insert(LegacyTable::new("actors", &["id"]));
        assert!(matches!(
            snap.table("movies"),
            Err(EtlError::SourceUnavailable { .. })
        ));
        let err = snap
            .table("actors")
            .unwrap()
            .require_columns(tables::ROSTER_COLUMNS)
            .unwrap_err();
        assert!(err.to_string().contains("name"));
    }
}
