// Linear ingestion flow: fetch, enrich, tabulate, sink

pub mod csv_load;
pub mod enrich;
pub mod tabulate;

use crate::apis::tmdb::TmdbClient;
use crate::constants::TABLE_WRITE_CHUNK_ROWS;
use crate::error::Result;
use crate::sink::parquet::{parquet_path, write_parquet};
use crate::sink::{write_table, TableSink};
use crate::table::Table;
use metrics::histogram;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

/// Where a finished table goes.
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// File stem for `<data_dir>/<name>.parquet`.
    pub name: String,
    pub table_name: String,
    /// `None` skips the Parquet file.
    pub parquet_dir: Option<PathBuf>,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub parquet_file: Option<PathBuf>,
    pub table_name: Option<String>,
    pub rows_written: u64,
    pub duration_secs: f64,
}

pub struct Pipeline;

impl Pipeline {
    /// Popular movies as a table, optionally left-joined with financials.
    #[instrument(skip(client))]
    pub async fn popular_movies(client: &TmdbClient, pages: u32, with_financials: bool) -> Result<Table> {
        let dataset = client.get_popular_movies(pages).await?;
        let movies = tabulate::movies_table(&dataset)?;
        if with_financials {
            enrich::enrich_with_financials(client, &movies).await
        } else {
            Ok(movies)
        }
    }

    /// Distinct genres across the popular movies' detail records.
    #[instrument(skip(client))]
    pub async fn popular_genres(client: &TmdbClient, pages: u32) -> Result<Table> {
        let dataset = client.get_popular_movies(pages).await?;
        let movies = tabulate::movies_table(&dataset)?;
        let ids = enrich::movie_ids(&movies)?;
        enrich::popular_genres_table(client, &ids).await
    }

    /// Write `table` to the Parquet file and/or the relational sink.
    pub async fn persist(
        table: &Table,
        options: &SinkOptions,
        sink: Option<&mut (dyn TableSink + '_)>,
    ) -> Result<PipelineResult> {
        let start = Instant::now();
        let mut result = PipelineResult {
            name: options.name.clone(),
            rows: table.num_rows(),
            columns: table.column_names().iter().map(|c| c.to_string()).collect(),
            parquet_file: None,
            table_name: None,
            rows_written: 0,
            duration_secs: 0.0,
        };

        if let Some(dir) = &options.parquet_dir {
            let path = parquet_path(dir, &options.name);
            write_parquet(table, &path)?;
            result.parquet_file = Some(path);
        }
        if let Some(sink) = sink {
            result.rows_written =
                write_table(sink, &options.table_name, table, TABLE_WRITE_CHUNK_ROWS).await?;
            result.table_name = Some(options.table_name.clone());
        }

        result.duration_secs = start.elapsed().as_secs_f64();
        Ok(result)
    }

    pub async fn run_popular_movies(
        client: &TmdbClient,
        pages: u32,
        with_financials: bool,
        options: &SinkOptions,
        sink: Option<&mut (dyn TableSink + '_)>,
    ) -> Result<PipelineResult> {
        let start = Instant::now();
        info!("Starting popular movies pipeline ({} pages)", pages);
        let table = Self::popular_movies(client, pages, with_financials).await?;
        let mut result = Self::persist(&table, options, sink).await?;
        result.duration_secs = start.elapsed().as_secs_f64();
        histogram!("movie_ingest_pipeline_duration_seconds", "pipeline" => options.name.clone())
            .record(result.duration_secs);
        info!("Pipeline {} finished with {} rows", options.name, result.rows);
        Ok(result)
    }

    pub async fn run_popular_genres(
        client: &TmdbClient,
        pages: u32,
        options: &SinkOptions,
        sink: Option<&mut (dyn TableSink + '_)>,
    ) -> Result<PipelineResult> {
        let start = Instant::now();
        info!("Starting popular genres pipeline ({} pages)", pages);
        let table = Self::popular_genres(client, pages).await?;
        let mut result = Self::persist(&table, options, sink).await?;
        result.duration_secs = start.elapsed().as_secs_f64();
        histogram!("movie_ingest_pipeline_duration_seconds", "pipeline" => options.name.clone())
            .record(result.duration_secs);
        info!("Pipeline {} finished with {} rows", options.name, result.rows);
        Ok(result)
    }
}

/// Remove the local data directory. Returns whether anything was removed.
pub fn remove_local_data(data_dir: &Path) -> Result<bool> {
    if !data_dir.exists() {
        return Ok(false);
    }
    info!("Removing {}", data_dir.display());
    fs::remove_dir_all(data_dir)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SqliteSink;
    use crate::table::{Cell, Column, ColumnType};

    fn one_row_table() -> Table {
        let mut table = Table::new(vec![
            Column::new("genre_id", ColumnType::Int64),
            Column::new("genre_name", ColumnType::Text),
        ]);
        table
            .push_row(vec![Cell::Int64(28), Cell::Text("Action".into())])
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_persist_to_parquet_and_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let options = SinkOptions {
            name: "genres_test".into(),
            table_name: "genres".into(),
            parquet_dir: Some(dir.path().join("data")),
        };
        let mut sink = SqliteSink::open_in_memory().unwrap();

        let result = Pipeline::persist(&one_row_table(), &options, Some(&mut sink))
            .await
            .unwrap();

        assert_eq!(result.rows, 1);
        assert_eq!(result.rows_written, 1);
        assert_eq!(
            result.parquet_file,
            Some(dir.path().join("data").join("genres_test.parquet"))
        );
        assert!(dir.path().join("data/genres_test.parquet").is_file());
        assert_eq!(sink.row_count("genres").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persist_with_no_targets_writes_nothing() {
        let options = SinkOptions {
            name: "genres_test".into(),
            table_name: "genres".into(),
            parquet_dir: None,
        };
        let result = Pipeline::persist(&one_row_table(), &options, None).await.unwrap();
        assert!(result.parquet_file.is_none());
        assert!(result.table_name.is_none());
        assert_eq!(result.rows_written, 0);
    }

    #[test]
    fn test_remove_local_data() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(data.join("nested")).unwrap();
        fs::write(data.join("movies.parquet"), b"x").unwrap();

        assert!(remove_local_data(&data).unwrap());
        assert!(!data.exists());
        assert!(!remove_local_data(&data).unwrap());
    }
}
