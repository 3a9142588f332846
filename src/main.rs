use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use movie_ingest::apis::tmdb::TmdbClient;
use movie_ingest::app::ports::HttpClientPort;
use movie_ingest::config::Config;
use movie_ingest::constants::{
    CSV_CHUNK_ROWS, POPULAR_GENRES, POPULAR_MOVIES, YELLOW_TAXI_DATETIME_COLUMNS, YELLOW_TAXI_TABLE,
    YELLOW_TAXI_URL,
};
use movie_ingest::infra::http_client::ReqwestHttp;
use movie_ingest::logging;
use movie_ingest::pipeline::csv_load::{download_if_missing, load_csv, CsvLoadOptions};
use movie_ingest::pipeline::{remove_local_data, Pipeline, PipelineResult, SinkOptions};
use movie_ingest::sink::{self, TableSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "movie_ingest")]
#[command(about = "Movie metadata and public CSV ingestion into Parquet and Postgres")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SinkArg {
    Parquet,
    Database,
    Both,
}

impl SinkArg {
    fn parquet(self) -> bool {
        matches!(self, SinkArg::Parquet | SinkArg::Both)
    }

    fn database(self) -> bool {
        matches!(self, SinkArg::Database | SinkArg::Both)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch popular movies and write them as a table
    Popular {
        /// Listing pages to fetch (defaults to tmdb.page_count)
        #[arg(long)]
        pages: Option<u32>,
        /// Join revenue, budget and runtime from one detail call per movie
        #[arg(long)]
        with_financials: bool,
        #[arg(long, value_enum, default_value_t = SinkArg::Parquet)]
        sink: SinkArg,
        /// Parquet file stem under the data directory
        #[arg(long, default_value = POPULAR_MOVIES)]
        name: String,
        /// Database table (defaults to database.movies_table)
        #[arg(long)]
        table: Option<String>,
    },
    /// Collect the distinct genres of the popular movies
    Genres {
        #[arg(long)]
        pages: Option<u32>,
        #[arg(long, value_enum, default_value_t = SinkArg::Parquet)]
        sink: SinkArg,
        #[arg(long, default_value = POPULAR_GENRES)]
        name: String,
        /// Database table (defaults to database.genres_table)
        #[arg(long)]
        table: Option<String>,
    },
    /// Download a CSV dataset and load it into a database table in chunks
    LoadCsv {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        database: Option<String>,
        /// postgresql or sqlite
        #[arg(long)]
        scheme: Option<String>,
        #[arg(long, default_value = YELLOW_TAXI_TABLE)]
        table_name: String,
        #[arg(long, default_value = YELLOW_TAXI_URL)]
        url: String,
        #[arg(long, default_value_t = CSV_CHUNK_ROWS)]
        chunk_rows: usize,
        /// Comma-separated columns parsed as timestamps
        #[arg(long)]
        datetime_columns: Option<String>,
        /// Where the download is stored (defaults to the data directory)
        #[arg(long)]
        local_path: Option<PathBuf>,
    },
    /// Remove the local data directory
    Clean {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn tmdb_client(config: &Config) -> anyhow::Result<TmdbClient> {
    let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new());
    Ok(TmdbClient::new(http, &config.tmdb)?)
}

async fn open_sink(config: &Config, target: SinkArg) -> anyhow::Result<Option<Box<dyn TableSink>>> {
    if !target.database() {
        return Ok(None);
    }
    let url = config.database.connection_url()?;
    let sink = sink::connect(&url).await.context("Failed to open database sink")?;
    Ok(Some(sink))
}

fn sink_options(config: &Config, target: SinkArg, name: String, table_name: String) -> SinkOptions {
    SinkOptions {
        name,
        table_name,
        parquet_dir: target.parquet().then(|| config.output.data_dir.clone()),
    }
}

fn print_result(result: &PipelineResult) {
    println!("\nPipeline results for {}:", result.name);
    println!("   Rows: {}", result.rows);
    println!("   Columns: {}", result.columns.join(", "));
    if let Some(path) = &result.parquet_file {
        println!("   Parquet file: {}", path.display());
    }
    if let Some(table) = &result.table_name {
        println!("   Table: {} ({} rows written)", table, result.rows_written);
    }
    println!("   Duration: {:.3}s", result.duration_secs);
}

/// `data/<file name of the URL without .gz>`
fn default_local_path(data_dir: &Path, url: &str) -> PathBuf {
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("download.csv");
    data_dir.join(file_name.trim_end_matches(".gz"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // --help and usage errors exit here, before logs/ is touched
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    logging::init_logging()?;
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    debug!("Loaded config: {:?}", config.output);

    match cli.command {
        Commands::Popular {
            pages,
            with_financials,
            sink,
            name,
            table,
        } => {
            let client = tmdb_client(&config)?;
            let pages = pages.unwrap_or(config.tmdb.page_count);
            let table_name = table.unwrap_or_else(|| config.database.movies_table.clone());
            let options = sink_options(&config, sink, name, table_name);
            let mut target = open_sink(&config, sink).await?;
            let result =
                Pipeline::run_popular_movies(&client, pages, with_financials, &options, target.as_deref_mut())
                    .await?;
            print_result(&result);
        }
        Commands::Genres {
            pages,
            sink,
            name,
            table,
        } => {
            let client = tmdb_client(&config)?;
            let pages = pages.unwrap_or(config.tmdb.page_count);
            let table_name = table.unwrap_or_else(|| config.database.genres_table.clone());
            let options = sink_options(&config, sink, name, table_name);
            let mut target = open_sink(&config, sink).await?;
            let result =
                Pipeline::run_popular_genres(&client, pages, &options, target.as_deref_mut()).await?;
            print_result(&result);
        }
        Commands::LoadCsv {
            user,
            password,
            host,
            port,
            database,
            scheme,
            table_name,
            url,
            chunk_rows,
            datetime_columns,
            local_path,
        } => {
            let db = &mut config.database;
            db.user = user.or(db.user.take());
            db.password = password.or(db.password.take());
            db.database = database.or(db.database.take());
            if let Some(host) = host {
                db.host = host;
            }
            if let Some(port) = port {
                db.port = port;
            }
            if let Some(scheme) = scheme {
                db.scheme = scheme;
            }

            let local_path = local_path.unwrap_or_else(|| default_local_path(&config.output.data_dir, &url));
            let http = ReqwestHttp::new();
            download_if_missing(&http, &url, &local_path).await?;

            let mut target = sink::connect(&config.database.connection_url()?)
                .await
                .context("Failed to open database sink")?;
            let datetime_columns = match datetime_columns {
                Some(list) => list
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => YELLOW_TAXI_DATETIME_COLUMNS.iter().map(|s| s.to_string()).collect(),
            };
            let options = CsvLoadOptions {
                table_name,
                chunk_rows,
                datetime_columns,
            };
            let result = load_csv(target.as_mut(), &local_path, &options).await?;
            println!(
                "\nLoaded {} rows in {} chunks into {} (first chunk: {:.3}s)",
                result.rows, result.chunks, result.table_name, result.first_chunk_secs
            );
        }
        Commands::Clean { data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| config.output.data_dir.clone());
            if remove_local_data(&data_dir)? {
                info!("Removed {}", data_dir.display());
            } else {
                info!("Nothing to remove at {}", data_dir.display());
            }
        }
    }
    Ok(())
}
