use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

use super::types::*;

pub const DEFAULT_TEST_URL: &str = "http://www.gstatic.com/generate_204";
const DEFAULT_DELAY_TIMEOUT_MS: u32 = 5000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Clash External Controller API client
#[derive(Debug, Clone)]
pub struct ClashClient {
    base_url: String,
    secret: Option<String>,
    client: HttpClient,
}

impl ClashClient {
    /// Create a new Clash client
    pub fn new(base_url: String, secret: Option<String>) -> Self {
        Self {
            base_url,
            secret,
            client: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).timeout(REQUEST_TIMEOUT);

        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request
            .send()
            .await
            .context(format!("Failed to connect to Clash API at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Clash API returned error: {} - {}",
                status,
                if body.is_empty() { "No details" } else { &body }
            );
        }

        response
            .json()
            .await
            .context("Failed to parse Clash API response")
    }

    /// Get all proxies
    pub async fn get_proxies(&self) -> Result<HashMap<String, Proxy>> {
        let response: ProxiesResponse = self.get("/proxies").await?;
        Ok(response.proxies)
    }

    /// Get specific proxy or group
    pub async fn get_proxy(&self, name: &str) -> Result<Proxy> {
        self.get(&format!("/proxies/{}", name)).await
    }

    /// Switch proxy selector to a specific proxy
    pub async fn select_proxy(&self, selector: &str, proxy: &str) -> Result<()> {
        let url = format!("{}/proxies/{}", self.base_url, selector);
        let mut request = self
            .client
            .put(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({"name": proxy}));

        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await.context("Failed to select proxy")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to select proxy: {} - {}", status, body);
        }

        Ok(())
    }

    /// Test proxy delay against a target URL, returning measured latency in
    /// milliseconds. Defaults: generate_204 target, 5000 ms timeout.
    pub async fn test_delay(
        &self,
        proxy_name: &str,
        test_url: Option<&str>,
        timeout: Option<u32>,
    ) -> Result<u32> {
        let test_url = test_url.filter(|u| !u.is_empty()).unwrap_or(DEFAULT_TEST_URL);
        let timeout = timeout.unwrap_or(DEFAULT_DELAY_TIMEOUT_MS);

        let path = format!(
            "/proxies/{}/delay?timeout={}&url={}",
            proxy_name, timeout, test_url
        );
        let response: DelayResponse = self.get(&path).await?;
        Ok(response.delay)
    }
}

/// Test whether a Clash API endpoint is reachable with the given secret.
/// Uses a short timeout so UI probes stay snappy.
pub async fn test_connection(base_url: &str, secret: Option<&str>) -> Result<()> {
    let client = HttpClient::new();
    let mut request = client
        .get(format!("{}/proxies", base_url))
        .timeout(PROBE_TIMEOUT);

    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        request = request.bearer_auth(secret);
    }

    let response = request
        .send()
        .await
        .context(format!("connection to {} failed", base_url))?;

    if response.status() == StatusCode::UNAUTHORIZED {
        anyhow::bail!("authentication failed: invalid secret");
    }
    if !response.status().is_success() {
        anyhow::bail!("unexpected status code: {}", response.status());
    }

    Ok(())
}

/// Probe common local Clash API addresses and return the first that
/// answers.
pub async fn auto_detect() -> Option<String> {
    const CANDIDATES: [&str; 2] = ["http://127.0.0.1:9090", "http://localhost:9090"];

    for url in CANDIDATES {
        if test_connection(url, None).await.is_ok() {
            return Some(url.to_string());
        }
    }

    None
}

/// Normalize a user-supplied API address: trim whitespace and default to
/// http:// when no scheme is given.
pub fn format_api_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_api_url_adds_scheme() {
        assert_eq!(format_api_url("127.0.0.1:9090"), "http://127.0.0.1:9090");
        assert_eq!(format_api_url(" 127.0.0.1:9090 "), "http://127.0.0.1:9090");
        assert_eq!(
            format_api_url("https://example.com:9090"),
            "https://example.com:9090"
        );
        assert_eq!(format_api_url(""), "");
    }
}
