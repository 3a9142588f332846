use crate::apis::tmdb::TmdbClient;
use crate::error::{IngestError, Result};
use crate::pipeline::tabulate::{financial_columns, financial_row, genre_columns, genres_table};
use crate::table::Table;
use tracing::{debug, info, instrument};

/// Identifiers from a table's `id` column, in row order. Null ids are skipped.
pub fn movie_ids(table: &Table) -> Result<Vec<i64>> {
    table
        .column_values("id")?
        .filter(|cell| !cell.is_null())
        .map(|cell| {
            cell.as_i64()
                .ok_or_else(|| IngestError::Schema("id column is not int64".into()))
        })
        .collect()
}

/// One detail call per id; rows are `(id, revenue, budget, runtime)`,
/// de-duplicated on `id` keeping the first.
#[instrument(skip(client, ids), fields(count = ids.len()))]
pub async fn financials_table(client: &TmdbClient, ids: &[i64]) -> Result<Table> {
    let mut table = Table::new(financial_columns());
    for (i, id) in ids.iter().enumerate() {
        let detail = client.get_movie_details(*id).await?;
        table.push_row(financial_row(&detail)?)?;
        if (i + 1) % 20 == 0 {
            debug!("Fetched financials for {}/{} movies", i + 1, ids.len());
        }
    }
    let dropped = table.drop_duplicates("id")?;
    if dropped > 0 {
        debug!("Dropped {} duplicate financial rows", dropped);
    }
    Ok(table)
}

/// Left-join `movies` with per-movie financials on `id`.
pub async fn enrich_with_financials(client: &TmdbClient, movies: &Table) -> Result<Table> {
    let ids = movie_ids(movies)?;
    info!("Fetching financial details for {} movies", ids.len());
    let financials = financials_table(client, &ids).await?;
    movies.left_join(&financials, "id")
}

/// Genre taxonomy across movies: each detail's `genres` sub-table is
/// concatenated, then de-duplicated on `genre_id` keeping the first seen.
#[instrument(skip(client, ids), fields(count = ids.len()))]
pub async fn popular_genres_table(client: &TmdbClient, ids: &[i64]) -> Result<Table> {
    let mut genres = Table::new(genre_columns());
    for id in ids {
        let detail = client.get_movie_details(*id).await?;
        genres.concat(genres_table(&detail)?)?;
        genres.drop_duplicates("genre_id")?;
    }
    info!("Collected {} distinct genres from {} movies", genres.num_rows(), ids.len());
    Ok(genres)
}
