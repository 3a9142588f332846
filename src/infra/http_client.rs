use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// `HttpClientPort` backed by a shared `reqwest::Client` with library-default timeouts.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpGetResult> {
        debug!("HTTP GET request to: {}", url);
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?.to_vec();
        debug!("HTTP response: status={}, size={} bytes", status, bytes.len());
        Ok(HttpGetResult { status, bytes })
    }
}
