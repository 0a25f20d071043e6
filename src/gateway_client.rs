use crate::gateways::GatewayError;
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP plumbing shared by every gateway adapter.
///
/// Wraps one pooled `reqwest::Client` and turns raw responses into either a
/// JSON body or a [`GatewayError`], so adapters only deal with payload shapes.
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: reqwest::Client,
}

impl GatewayHttpClient {
    /// Creates a new `GatewayHttpClient`.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound for a whole outbound request.
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = build_http_client(timeout)
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    /// Sends a request and returns the JSON body of a 2xx answer.
    ///
    /// Bodies that are empty or not JSON decode as `{}`; a non-2xx status
    /// becomes [`GatewayError::UpstreamRejected`] carrying the upstream body.
    pub async fn execute(&self, label: &str, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{} request failed: {}", label, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| Value::Object(Default::default()));

        if !status.is_success() {
            tracing::error!("[{}] Upstream returned {}: {}", label, status, text);
            let message = ["error", "message"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .filter(|m| !m.is_empty())
                .unwrap_or("Failed to create PIX charge")
                .to_string();
            return Err(GatewayError::UpstreamRejected {
                status: status.as_u16(),
                message,
                body,
            });
        }

        Ok(body)
    }
}

pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Joins path segments onto a base URL, percent-encoding each segment.
pub fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, GatewayError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| GatewayError::NotConfigured(format!("Invalid gateway URL '{}': {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| GatewayError::NotConfigured(format!("Gateway URL '{}' cannot be a base", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
