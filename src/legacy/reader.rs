use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, instrument};

use super::{LegacyRow, LegacySnapshot, LegacyTable, RawValue};
use crate::error::{EtlError, EtlResult};

/// Read-only handle on the legacy SQLite file.
pub struct LegacyReader {
    conn: Connection,
    path: PathBuf,
}

impl LegacyReader {
    /// Opens the file read-only; a missing file is an error, never an empty new database.
    #[instrument]
    pub fn open(path: &Path) -> EtlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            EtlError::source_unavailable(format!("cannot open {}", path.display()), e)
        })?;
        info!(path = %path.display(), "opened legacy store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// User tables, sorted by name. SQLite bookkeeping tables (`sqlite_sequence`, ...) are excluded.
    pub fn list_tables(&self) -> EtlResult<Vec<String>> {
        let fail = |e| EtlError::source_unavailable(format!("cannot list tables of {}", self.path.display()), e);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name",
            )
            .map_err(fail)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(fail)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?;
        Ok(names)
    }

    /// Full row set of `name`, columns in declared order.
    #[instrument(skip(self))]
    pub fn load_table(&self, name: &str) -> EtlResult<LegacyTable> {
        let fail = |e| EtlError::source_unavailable(format!("cannot read table '{name}'"), e);

        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [name],
                |row| row.get(0),
            )
            .map_err(fail)?;
        if !exists {
            return Err(EtlError::SourceUnavailable {
                detail: format!("table '{name}' is missing from the legacy store"),
                source: None,
            });
        }

        let sql = format!("SELECT * FROM \"{}\"", name.replace('"', "\"\""));
        let mut stmt = self.conn.prepare(&sql).map_err(fail)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut table = LegacyTable {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        };
        let mut rows = stmt.query([]).map_err(fail)?;
        while let Some(row) = rows.next().map_err(fail)? {
            let mut out = LegacyRow::new();
            for (idx, column) in table.columns.iter().enumerate() {
                let value = match row.get_ref(idx).map_err(fail)? {
                    ValueRef::Null => RawValue::Null,
                    ValueRef::Integer(i) => RawValue::Integer(i),
                    ValueRef::Real(f) => RawValue::Real(f),
                    ValueRef::Text(t) => RawValue::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => RawValue::Blob(b.to_vec()),
                };
                out.insert(column.clone(), value);
            }
            table.rows.push(out);
        }
        debug!(table = name, rows = table.rows.len(), "loaded legacy table");
        Ok(table)
    }

    /// Every user table in memory.
    pub fn load_all(&self) -> EtlResult<LegacySnapshot> {
        let mut snapshot = LegacySnapshot::default();
        for name in self.list_tables()? {
            snapshot.insert(self.load_table(&name)?);
        }
        info!(
            tables = snapshot.table_names().count(),
            rows = snapshot.row_count(),
            "legacy snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Releases the file handle.
    pub fn close(self) -> EtlResult<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| {
            EtlError::source_unavailable(format!("cannot close {}", path.display()), e)
        })
    }
}
