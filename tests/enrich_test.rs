mod common;

use common::{detail, detail_url, movie, page_url, tmdb_config, FakeHttp};
use movie_ingest::apis::tmdb::TmdbClient;
use movie_ingest::error::IngestError;
use movie_ingest::pipeline::enrich::{financials_table, popular_genres_table};
use movie_ingest::pipeline::Pipeline;
use movie_ingest::table::Cell;
use serde_json::json;
use std::sync::Arc;

fn client(http: &Arc<FakeHttp>) -> TmdbClient {
    TmdbClient::new(http.clone(), &tmdb_config()).unwrap()
}

#[tokio::test]
async fn test_genres_deduplicate_keeping_first_seen() {
    let http = Arc::new(FakeHttp::new());
    http.respond_json(&detail_url(1), detail(1, 0, 0, &[(28, "Action"), (12, "Adventure")]));
    http.respond_json(&detail_url(2), detail(2, 0, 0, &[(28, "Action Renamed"), (35, "Comedy")]));

    let genres = popular_genres_table(&client(&http), &[1, 2]).await.unwrap();

    assert_eq!(genres.column_names(), vec!["genre_id", "genre_name"]);
    assert_eq!(genres.num_rows(), 3);
    let ids: Vec<&Cell> = genres.column_values("genre_id").unwrap().collect();
    assert_eq!(ids, vec![&Cell::Int64(28), &Cell::Int64(12), &Cell::Int64(35)]);
    assert_eq!(genres.rows()[0][1], Cell::Text("Action".into()));
}

#[tokio::test]
async fn test_financials_one_call_per_row_then_dedupe() {
    let http = Arc::new(FakeHttp::new());
    http.respond_json(&detail_url(1), detail(1, 1000, 400, &[]));
    http.respond_json(&detail_url(2), detail(2, 50, 80, &[]));

    let table = financials_table(&client(&http), &[1, 2, 1]).await.unwrap();

    assert_eq!(http.requested_urls().len(), 3);
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.column_names(), vec!["id", "revenue", "budget", "runtime"]);
}

#[tokio::test]
async fn test_popular_movies_with_financials_left_join() {
    let http = Arc::new(FakeHttp::new());
    http.respond_json(
        &page_url(1),
        json!({"results": [movie(1, "A", &[28]), movie(2, "B", &[12, 35])]}),
    );
    http.respond_json(&detail_url(1), detail(1, 1000, 400, &[]));
    http.respond_json(&detail_url(2), detail(2, 50, 80, &[]));

    let table = Pipeline::popular_movies(&client(&http), 1, true).await.unwrap();

    assert_eq!(table.num_rows(), 2);
    assert_eq!(
        table.column_names(),
        vec![
            "id",
            "title",
            "original_language",
            "popularity",
            "release_date",
            "genre_ids",
            "vote_average",
            "vote_count",
            "revenue",
            "budget",
            "runtime"
        ]
    );
    let budget = table.column_index("budget").unwrap();
    assert_eq!(table.rows()[0][budget], Cell::Int64(400));
    assert_eq!(table.rows()[1][budget], Cell::Int64(80));
    assert_eq!(table.rows()[1][5], Cell::Int64List(vec![12, 35]));
}

#[tokio::test]
async fn test_detail_failure_aborts_enrichment() {
    let http = Arc::new(FakeHttp::new());
    http.respond_json(&page_url(1), json!({"results": [movie(1, "A", &[])]}));

    let err = Pipeline::popular_movies(&client(&http), 1, true).await.unwrap_err();
    assert!(matches!(err, IngestError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_popular_genres_pipeline_fetches_details_per_movie() {
    let http = Arc::new(FakeHttp::new());
    http.respond_json(
        &page_url(1),
        json!({"results": [movie(1, "A", &[28]), movie(2, "B", &[28])]}),
    );
    http.respond_json(&detail_url(1), detail(1, 0, 0, &[(28, "Action")]));
    http.respond_json(&detail_url(2), detail(2, 0, 0, &[(28, "Action")]));

    let genres = Pipeline::popular_genres(&client(&http), 1).await.unwrap();
    assert_eq!(genres.num_rows(), 1);
    assert_eq!(http.requested_urls().len(), 3);
}
