//! Defaults shared by the CLI, the config loader and the pipelines.

// TMDB API
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const TMDB_LANGUAGE: &str = "en-US";
pub const DEFAULT_PAGE_COUNT: u32 = 5;

// Local output
pub const DEFAULT_DATA_DIR: &str = "data";
pub const PARQUET_EXTENSION: &str = "parquet";

// Relational sink
pub const DEFAULT_DB_SCHEME: &str = "postgresql";
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_MOVIES_TABLE: &str = "movies";
pub const DEFAULT_GENRES_TABLE: &str = "genres";

/// Rows per INSERT batch when writing a tabulated API result.
pub const TABLE_WRITE_CHUNK_ROWS: usize = 10_000;

// Public CSV dataset
pub const CSV_CHUNK_ROWS: usize = 100_000;
pub const YELLOW_TAXI_URL: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow/yellow_tripdata_2021-01.csv.gz";
pub const YELLOW_TAXI_TABLE: &str = "yellow_taxi_data";
pub const YELLOW_TAXI_DATETIME_COLUMNS: &[&str] = &["tpep_pickup_datetime", "tpep_dropoff_datetime"];

// Pipeline names (used for file names and log spans)
pub const POPULAR_MOVIES: &str = "popular_movies";
pub const POPULAR_GENRES: &str = "popular_genres";

// Logging
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "movie_ingest.log";
