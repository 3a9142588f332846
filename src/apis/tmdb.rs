use crate::app::ports::HttpClientPort;
use crate::config::TmdbConfig;
use crate::error::{IngestError, Result};
use metrics::counter;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One entry of a listing page's `results` array.
pub type RawMovie = Value;

/// Body of the `/movie/{id}` endpoint.
pub type RawMovieDetail = Value;

pub struct TmdbClient {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
    language: String,
    append_to_response: Option<String>,
    token: String,
}

impl TmdbClient {
    pub fn new(http: Arc<dyn HttpClientPort>, config: &TmdbConfig) -> Result<Self> {
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            append_to_response: config.append_to_response.clone(),
            token: config.bearer_token()?.to_string(),
        })
    }

    /// Fetch `pages` pages of the popular-movies listing and concatenate their
    /// `results`. Any non-success page fails the whole fetch.
    #[instrument(skip(self))]
    pub async fn get_popular_movies(&self, pages: u32) -> Result<Vec<RawMovie>> {
        let mut dataset = Vec::new();
        for page in 1..=pages {
            let url = self.url(
                "movie/popular",
                &[("language", self.language.clone()), ("page", page.to_string())],
            )?;
            let body = self.get_json(&url).await?;
            let results = body
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| IngestError::MissingField(format!("results (page {page})")))?;

            debug!("Page {} returned {} movies", page, results.len());
            counter!("movie_ingest_pages_fetched_total").increment(1);
            dataset.extend(results.iter().cloned());
        }
        info!("Fetched {} movies from {} pages", dataset.len(), pages);
        Ok(dataset)
    }

    /// Fetch the detail record for one movie.
    #[instrument(skip(self))]
    pub async fn get_movie_details(&self, movie_id: i64) -> Result<RawMovieDetail> {
        let query: Vec<(&str, String)> = self
            .append_to_response
            .iter()
            .map(|v| ("append_to_response", v.clone()))
            .collect();
        let url = self.url(&format!("movie/{movie_id}"), &query)?;
        let detail = self.get_json(&url).await?;
        counter!("movie_ingest_detail_requests_total").increment(1);
        Ok(detail)
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        url.map_err(|e| IngestError::Config(format!("invalid TMDB url '{raw}': {e}")))
    }

    async fn get_json(&self, url: &Url) -> Result<Value> {
        let headers = [
            ("accept", "application/json".to_string()),
            ("Authorization", format!("Bearer {}", self.token)),
        ];
        let resp = self.http.get(url.as_str(), &headers).await?;
        if !resp.is_success() {
            counter!("movie_ingest_api_errors_total").increment(1);
            return Err(IngestError::Api {
                url: url.to_string(),
                status: resp.status,
            });
        }
        Ok(serde_json::from_slice(&resp.bytes)?)
    }
}
