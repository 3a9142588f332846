//! In-memory tabular structure assembled before a sink write.
//!
//! A `Table` is an ordered list of rows over a fixed, typed column set. Every
//! cell may be null; a non-null cell must match its column's type.

use crate::error::{IngestError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Text,
    Date,
    Timestamp,
    Int64List,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Int64List => "int64[]",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int64(i64),
    Float64(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Int64List(Vec<i64>),
}

impl Cell {
    /// `None` for null, which fits any column.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Cell::Null => None,
            Cell::Int64(_) => Some(ColumnType::Int64),
            Cell::Float64(_) => Some(ColumnType::Float64),
            Cell::Text(_) => Some(ColumnType::Text),
            Cell::Date(_) => Some(ColumnType::Date),
            Cell::Timestamp(_) => Some(ColumnType::Timestamp),
            Cell::Int64List(_) => Some(ColumnType::Int64List),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int64(v) => Some(*v),
            _ => None,
        }
    }

    fn key(&self) -> Result<Key> {
        match self {
            Cell::Null => Ok(Key::Null),
            Cell::Int64(v) => Ok(Key::Int(*v)),
            Cell::Text(s) => Ok(Key::Text(s.clone())),
            Cell::Date(d) => Ok(Key::Date(*d)),
            other => Err(IngestError::Schema(format!(
                "{} values cannot be used as a key",
                other.column_type().map(|t| t.to_string()).unwrap_or_default()
            ))),
        }
    }
}

/// Hashable projection of a key cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Null,
    Int(i64),
    Text(String),
    Date(NaiveDate),
}

fn ensure_key_type(column: &Column) -> Result<()> {
    match column.column_type {
        ColumnType::Int64 | ColumnType::Text | ColumnType::Date => Ok(()),
        other => Err(IngestError::Schema(format!(
            "column '{}' is {} and cannot be used as a key",
            column.name, other
        ))),
    }
}

pub type Row = Vec<Cell>;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| IngestError::Schema(format!("no column named '{name}'")))
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(IngestError::Schema(format!(
                "row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (cell, column) in row.iter().zip(&self.columns) {
            if let Some(t) = cell.column_type() {
                if t != column.column_type {
                    return Err(IngestError::Schema(format!(
                        "column '{}' is {} but got a {} value",
                        column.name, column.column_type, t
                    )));
                }
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Zero-row copy carrying only the column set.
    pub fn header(&self) -> Table {
        Table::new(self.columns.clone())
    }

    /// Append all rows of `other`, which must have the same columns.
    pub fn concat(&mut self, other: Table) -> Result<()> {
        if other.columns != self.columns {
            return Err(IngestError::Schema(format!(
                "cannot concatenate tables with columns {:?} and {:?}",
                self.column_names(),
                other.column_names()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Drop rows whose `column` value was already seen, keeping the first.
    /// Returns how many rows were dropped.
    pub fn drop_duplicates(&mut self, column: &str) -> Result<usize> {
        let idx = self.column_index(column)?;
        ensure_key_type(&self.columns[idx])?;
        let before = self.rows.len();
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(before);
        for row in std::mem::take(&mut self.rows) {
            if seen.insert(row[idx].key()?) {
                kept.push(row);
            }
        }
        self.rows = kept;
        Ok(before - self.rows.len())
    }

    /// Left join on `on`: every left row is kept in order, extended with the
    /// right table's other columns from the first right row sharing its key.
    /// Left rows without a match (or with a null key) get nulls.
    pub fn left_join(&self, right: &Table, on: &str) -> Result<Table> {
        let left_idx = self.column_index(on)?;
        let right_idx = right.column_index(on)?;
        if self.columns[left_idx].column_type != right.columns[right_idx].column_type {
            return Err(IngestError::Schema(format!(
                "join column '{on}' has different types on each side"
            )));
        }

        ensure_key_type(&self.columns[left_idx])?;

        let mut columns = self.columns.clone();
        for (i, column) in right.columns.iter().enumerate() {
            if i == right_idx {
                continue;
            }
            if columns.iter().any(|c| c.name == column.name) {
                return Err(IngestError::Schema(format!(
                    "column '{}' exists on both sides of the join",
                    column.name
                )));
            }
            columns.push(column.clone());
        }

        let mut lookup: HashMap<Key, &Row> = HashMap::new();
        for row in &right.rows {
            let key = row[right_idx].key()?;
            if key != Key::Null {
                lookup.entry(key).or_insert(row);
            }
        }

        let extra = right.columns.len() - 1;
        let mut joined = Table::new(columns);
        for row in &self.rows {
            let mut out = row.clone();
            match lookup.get(&row[left_idx].key()?) {
                Some(matched) => out.extend(
                    matched
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != right_idx)
                        .map(|(_, cell)| cell.clone()),
                ),
                None => out.extend(std::iter::repeat(Cell::Null).take(extra)),
            }
            joined.rows.push(out);
        }
        Ok(joined)
    }
}
