use crate::error::Result;
use async_trait::async_trait;

/// Outbound HTTP GET used by the TMDB client and the CSV downloader.
///
/// Implementations return the status and body whatever the status; callers decide
/// what a non-success status means.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}
