#![allow(dead_code)]

use async_trait::async_trait;
use movie_ingest::app::ports::{HttpClientPort, HttpGetResult};
use movie_ingest::config::TmdbConfig;
use movie_ingest::error::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub const BASE_URL: &str = "http://tmdb.test/3";
pub const TOKEN: &str = "test-token";

/// Canned responses keyed by full URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: Vec<u8>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body));
    }

    pub fn respond_json(&self, url: &str, body: Value) {
        self.respond(url, 200, serde_json::to_vec(&body).unwrap());
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn headers_of(&self, index: usize) -> Vec<(String, String)> {
        self.requests.lock().unwrap()[index].1.clone()
    }
}

#[async_trait]
impl HttpClientPort for FakeHttp {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpGetResult> {
        self.requests.lock().unwrap().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        let (status, bytes) = self
            .routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or((404, b"{\"status_message\":\"not found\"}".to_vec()));
        Ok(HttpGetResult { status, bytes })
    }
}

pub fn tmdb_config() -> TmdbConfig {
    TmdbConfig {
        base_url: BASE_URL.to_string(),
        read_access_token: Some(TOKEN.to_string()),
        ..TmdbConfig::default()
    }
}

pub fn page_url(page: u32) -> String {
    format!("{BASE_URL}/movie/popular?language=en-US&page={page}")
}

pub fn detail_url(id: i64) -> String {
    format!("{BASE_URL}/movie/{id}")
}

pub fn movie(id: i64, title: &str, genre_ids: &[i64]) -> Value {
    json!({
        "id": id,
        "title": title,
        "original_language": "en",
        "popularity": 12.5,
        "release_date": "2020-01-01",
        "genre_ids": genre_ids,
        "vote_average": 7.1,
        "vote_count": 300,
        "adult": false
    })
}

pub fn detail(id: i64, revenue: i64, budget: i64, genres: &[(i64, &str)]) -> Value {
    let genres: Vec<Value> = genres
        .iter()
        .map(|(gid, name)| json!({"id": gid, "name": name}))
        .collect();
    json!({
        "id": id,
        "revenue": revenue,
        "budget": budget,
        "runtime": 110,
        "genres": genres
    })
}
