//! HTTP client for the Pulse server REST API.
//!
//! Handles bearer-token authentication, timeout management, status
//! classification, and request/response lifecycle. The token is
//! runtime-swappable so a re-login can refresh it without rebuilding
//! the client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;

use pulse_core::config::ServerConfig;
use pulse_core::constants;
use pulse_core::error::{PulseError, PulseResult};

use crate::response::ApiResponse;

/// HTTP client for communicating with the Pulse server.
///
/// Wraps reqwest::Client with Pulse-specific bearer authentication
/// and error handling.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://pulse.example.com/api").
    api_root: String,
    /// Server origin (scheme + host, no path).
    origin: String,
    /// Bearer token attached to every request once set.
    token: Arc<RwLock<Option<String>>>,
    /// Default request timeout.
    timeout: Duration,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> PulseResult<Self> {
        let sanitized_address =
            pulse_core::config::AppConfig::sanitize_server_address(&config.address);

        let inner = Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms))
            .connect_timeout(Duration::from_secs(15))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| PulseError::Http(format!("failed to build HTTP client: {e}")))?;

        let origin = derive_origin(&sanitized_address);
        let api_root = format!("{origin}/{}", constants::API_PREFIX);
        let timeout = Duration::from_millis(config.api_timeout_ms);

        Ok(Self {
            inner,
            api_root,
            origin,
            token: Arc::new(RwLock::new(None)),
            timeout,
        })
    }

    /// Get the current API root URL.
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Get the server origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Set or replace the bearer token used for authenticated requests.
    pub async fn set_token(&self, token: Option<String>) {
        let mut guard = self.token.write().await;
        *guard = token;
        if guard.is_some() {
            debug!("bearer token set");
        } else {
            debug!("bearer token cleared");
        }
    }

    /// Get a copy of the current bearer token, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Build the full URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    /// Internal: build a request with the bearer header and optional JSON body.
    async fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        if let Some(token) = self.token.read().await.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
    }

    /// Execute a request and classify transport/status failures.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> PulseResult<Response> {
        let url = self.url(path);
        debug!("{} {}", method, path);

        let builder = self.build_request(method, &url, body).await;
        let response = builder.send().await.map_err(Self::classify_error)?;
        Self::check_status(response).await
    }

    // --- Public HTTP methods ---

    /// Execute a GET request.
    pub async fn get(&self, path: &str) -> PulseResult<Response> {
        self.request(Method::GET, path, None).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> PulseResult<Response> {
        self.request(Method::POST, path, Some(body)).await
    }

    // --- Response helpers ---

    /// Ping the server to check health. Returns the round-trip latency.
    pub async fn health_check(&self) -> PulseResult<Duration> {
        let start = std::time::Instant::now();
        let resp: ApiResponse = self.get_json("/health").await?;
        if resp.is_success() {
            Ok(start.elapsed())
        } else {
            Err(PulseError::Http("health check failed".into()))
        }
    }

    /// Deserialize a response body into an ApiResponse<T>.
    pub async fn parse_response<T: DeserializeOwned>(
        response: Response,
    ) -> PulseResult<ApiResponse<T>> {
        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| PulseError::Serialization(format!("failed to parse response: {e}")))
    }

    /// Convenience: GET + parse into ApiResponse<T>.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PulseResult<ApiResponse<T>> {
        let resp = self.get(path).await?;
        Self::parse_response(resp).await
    }

    /// Convenience: POST + parse into ApiResponse<T>.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> PulseResult<ApiResponse<T>> {
        let resp = self.post(path, body).await?;
        Self::parse_response(resp).await
    }

    /// Check the HTTP status code and convert to PulseError if needed.
    async fn check_status(response: Response) -> PulseResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PulseError::AuthFailed(format!("server returned {status}")));
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(PulseError::ServerError {
                code: status.as_u16(),
                message: body,
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into a PulseError variant.
    fn classify_error(e: reqwest::Error) -> PulseError {
        if e.is_timeout() {
            PulseError::Timeout(e.to_string())
        } else if e.is_connect() {
            PulseError::Http(format!("connection failed: {e}"))
        } else {
            PulseError::Http(e.to_string())
        }
    }
}

/// Derive the origin (scheme + host + optional port) from a server address.
fn derive_origin(address: &str) -> String {
    if let Ok(url) = reqwest::Url::parse(address) {
        let host = url.host_str().unwrap_or("localhost");
        match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        }
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            address: "http://localhost:5000".into(),
            username: "analyst".into(),
            api_timeout_ms: 30000,
        }
    }

    #[test]
    fn test_derive_origin() {
        assert_eq!(
            derive_origin("https://pulse.example.com/api"),
            "https://pulse.example.com"
        );
        assert_eq!(
            derive_origin("http://192.168.1.100:5000"),
            "http://192.168.1.100:5000"
        );
    }

    #[test]
    fn test_api_root() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert_eq!(client.api_root(), "http://localhost:5000/api");
    }

    #[tokio::test]
    async fn test_token_swap() {
        let client = ApiClient::new(&test_config()).unwrap();
        assert!(client.token().await.is_none());

        client.set_token(Some("t1".into())).await;
        assert_eq!(client.token().await.as_deref(), Some("t1"));

        client.set_token(None).await;
        assert!(client.token().await.is_none());
    }
}
