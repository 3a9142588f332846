//! Gzip-compressed Parquet output.
//!
//! A table is converted to a single Arrow `RecordBatch` and written with
//! `ArrowWriter`. Dates are stored as Date32, timestamps as microseconds
//! without a time zone, integer lists as `List<Int64>`.

use crate::constants::PARQUET_EXTENSION;
use crate::error::{IngestError, Result};
use crate::table::{Cell, ColumnType, Table};
use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int64Array, ListArray, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// What a written file holds, read back from its footer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParquetSummary {
    pub num_rows: i64,
    pub columns: Vec<String>,
}

/// `<data_dir>/<name>.parquet`
pub fn parquet_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{name}.{PARQUET_EXTENSION}"))
}

/// Write `table` to `path`, creating parent directories and replacing any
/// existing file.
pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let batch = to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::GZIP(GzipLevel::default()))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    info!("Wrote {} rows to {}", table.num_rows(), path.display());
    Ok(())
}

pub fn read_parquet_summary(path: &Path) -> Result<ParquetSummary> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let columns = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let num_rows = builder.metadata().file_metadata().num_rows();
    Ok(ParquetSummary { num_rows, columns })
}

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Date => DataType::Date32,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnType::Int64List => {
            DataType::List(Arc::new(Field::new("item", DataType::Int64, true)))
        }
    }
}

pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.column_type), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let cells = table.rows().iter().map(move |row| &row[idx]);
            build_array(&column.name, column.column_type, cells)
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn build_array<'a>(
    name: &str,
    column_type: ColumnType,
    cells: impl Iterator<Item = &'a Cell>,
) -> Result<ArrayRef> {
    let mismatch = |cell: &Cell| {
        IngestError::Schema(format!("column '{name}' holds an unexpected value {cell:?}"))
    };
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();

    let array: ArrayRef = match column_type {
        ColumnType::Int64 => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Int64(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Int64Array>>()?,
        ),
        ColumnType::Float64 => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Float64(v) => Ok(Some(*v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Float64Array>>()?,
        ),
        ColumnType::Text => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Text(v) => Ok(Some(v.as_str())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<StringArray>>()?,
        ),
        ColumnType::Date => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Date(d) => Ok(Some((*d - epoch).num_days() as i32)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Date32Array>>()?,
        ),
        ColumnType::Timestamp => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Timestamp(ts) => Ok(Some(ts.and_utc().timestamp_micros())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<TimestampMicrosecondArray>>()?,
        ),
        ColumnType::Int64List => {
            let values = cells
                .map(|c| match c {
                    Cell::Null => Ok(None),
                    Cell::Int64List(v) => Ok(Some(v.iter().copied().map(Some).collect::<Vec<_>>())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(values))
        }
    };
    Ok(array)
}
