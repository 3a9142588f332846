use super::{quote_ident, TableSink};
use crate::error::Result;
use crate::table::{Cell, Column, ColumnType, Row, Table};
use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// Local SQLite target. Dates and timestamps are stored as ISO-8601 text,
/// integer lists as JSON arrays.
pub struct SqliteSink {
    conn: Connection,
    location: String,
}

impl SqliteSink {
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            location: path.to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            location: ":memory:".to_string(),
        })
    }

    /// `(name, declared type)` per column, from `PRAGMA table_info`.
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table_name)))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int64 => "INTEGER",
        ColumnType::Float64 => "REAL",
        ColumnType::Text | ColumnType::Date | ColumnType::Timestamp | ColumnType::Int64List => "TEXT",
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Cell::Null => Value::Null,
            Cell::Int64(v) => Value::Integer(*v),
            Cell::Float64(v) => Value::Real(*v),
            Cell::Text(v) => Value::Text(v.clone()),
            Cell::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
            Cell::Timestamp(ts) => Value::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Cell::Int64List(v) => Value::Text(
                serde_json::to_string(v)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            ),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[async_trait]
impl TableSink for SqliteSink {
    fn describe(&self) -> String {
        format!("sqlite://{}", self.location)
    }

    async fn replace_schema(&mut self, table_name: &str, header: &Table) -> Result<()> {
        let columns = header
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.column_type)))
            .collect::<Vec<_>>()
            .join(", ");
        let table = quote_ident(table_name);
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({columns});"
        ))?;
        Ok(())
    }

    async fn append_rows(&mut self, table_name: &str, columns: &[Column], rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let names = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders})",
            quote_ident(table_name)
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }

    async fn row_count(&mut self, table_name: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table_name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
