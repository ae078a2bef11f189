use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{HttpFetcher, HttpMethod, HttpResponse};
use crate::error::{Error, Result};

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .expect("reqwest client builds with default TLS config"),
        }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &HashMap<String, String>,
        body: &[u8],
        deadline: Duration,
    ) -> Result<HttpResponse> {
        let m = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut req = self.client.request(m, url).timeout(deadline);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        if !body.is_empty() {
            req = req.body(body.to_vec());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::TransientIo(e.to_string()))?;

        let status = resp.status().as_u16();
        let resp_headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::TransientIo(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers: resp_headers,
            body,
        })
    }
}
