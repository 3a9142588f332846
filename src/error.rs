use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {url} returned status {status}")]
    Api { url: String, status: u16 },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Cannot coerce value {value:?} in column '{column}'")]
    Coercion { column: String, value: String },

    #[error("Table schema error: {0}")]
    Schema(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IngestError {
    pub(crate) fn coercion(column: &str, value: impl ToString) -> Self {
        IngestError::Coercion {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
