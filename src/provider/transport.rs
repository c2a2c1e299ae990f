//! Provider HTTP transport
//!
//! The transport is the seam between the provider client and the network so
//! tests can substitute a fake without a live provider.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(format!("Invalid HTTP method: {}", s)),
        }
    }
}

/// Raw response as seen by the client layer
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<Value>,
}

/// Unified interface for reaching the provider API
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Execute one HTTP request. Implementations must apply `timeout`;
    /// a hung provider call must not hold a worker indefinitely.
    async fn execute(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
        timeout: Duration,
    ) -> Result<TransportResponse, String>;
}

/// reqwest-backed transport with bearer-token auth
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpTransport {
    pub fn new(base_url: String, api_token: String) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn execute(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
        timeout: Duration,
    ) -> Result<TransportResponse, String> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
        }
        .bearer_auth(&self.api_token)
        .timeout(timeout);

        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("Request to {} timed out", endpoint)
            } else {
                format!("Request to {} failed: {}", endpoint, e)
            }
        })?;

        let status = response.status().as_u16();
        // Tolerate empty or non-JSON bodies; the status carries the outcome
        let body = response.json::<Value>().await.ok();

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_roundtrip() {
        for method in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
        ] {
            let parsed: HttpMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
    }

    #[test]
    fn test_http_method_parse_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("Get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("PATCH".parse::<HttpMethod>().is_err());
    }
}
