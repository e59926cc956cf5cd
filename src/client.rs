use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client, Method};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "kopf-rest/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 5;

pub type TransportFuture = Pin<Box<dyn Future<Output = Result<ClusterResponse>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single call against the cluster's query endpoint.
///
/// The returned future owns everything it needs so it can be spawned.
pub trait Transport: Send + Sync {
    fn cluster_request(&self, method: &str, path: &str, body: &str) -> TransportFuture;
}

pub struct ClusterClient {
    client: Client,
    host: Url,
}

impl ClusterClient {
    pub fn new(host: &str) -> Result<Self> {
        let host = Url::parse(host).with_context(|| format!("invalid cluster host {host}"))?;
        if !host.scheme().starts_with("http") {
            return Err(anyhow!("unsupported cluster scheme: {}", host.scheme()));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client, host })
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint(&self.host, path)
    }
}

impl Transport for ClusterClient {
    fn cluster_request(&self, method: &str, path: &str, body: &str) -> TransportFuture {
        let client = self.client.clone();
        let url = self.endpoint(path);
        let method = method.to_string();
        let body = body.to_string();

        Box::pin(execute(client, method, url, body))
    }
}

async fn execute(
    client: Client,
    method: String,
    url: String,
    body: String,
) -> Result<ClusterResponse> {
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method: {method}"))?;
    tracing::info!("{method} {url}");

    let mut builder = client.request(method.clone(), &url);
    if !body.is_empty() {
        builder = builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| anyhow!("Failed to reach {}: {}", url, e))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

    tracing::debug!("{method} {url} -> {status}");
    if !status.is_success() {
        return Err(anyhow!("HTTP error {}: {}", status, pretty_body(&text)));
    }

    Ok(ClusterResponse {
        status: status.as_u16(),
        body: pretty_body(&text),
    })
}

fn endpoint(host: &Url, path: &str) -> String {
    let base = host.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Pretty-prints JSON payloads; anything else is returned as received.
fn pretty_body(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoint_joins_host_and_path() {
        let host = Url::parse("http://localhost:9200").expect("url");
        assert_eq!(endpoint(&host, "/_search"), "http://localhost:9200/_search");
        assert_eq!(endpoint(&host, "_cat/indices"), "http://localhost:9200/_cat/indices");
    }

    #[test]
    fn endpoint_keeps_host_prefix() {
        let host = Url::parse("https://proxy.local/es/").expect("url");
        assert_eq!(endpoint(&host, "/_search"), "https://proxy.local/es/_search");
    }

    #[test]
    fn rejects_non_http_host() {
        assert!(ClusterClient::new("ftp://cluster").is_err());
        assert!(ClusterClient::new("not a url").is_err());
    }

    #[test]
    fn json_bodies_are_pretty_printed() {
        assert_eq!(pretty_body(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
        assert_eq!(pretty_body("green open idx"), "green open idx");
    }
}
