//! Outbound call description and the transport seam that executes it.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// Description of one outbound call against a service's base URL.
#[derive(Debug, Clone)]
pub struct CallSpec {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the client's base URL (leading slash expected).
    pub path: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// JSON request body.
    pub body: Option<Value>,
}

impl CallSpec {
    /// Create a call spec with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// GET request for a path.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request for a path.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PATCH request for a path.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// DELETE request for a path.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set the JSON request body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response from one outbound call.
#[derive(Debug, Clone)]
pub struct CallResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response body, parsed as JSON when possible, else a JSON string.
    pub body: Value,
}

impl CallResponse {
    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_value(self.body.clone()).map_err(|e| ClientError::Payload(e.to_string()))
    }

    /// Body rendered as a short string for error messages.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Executes the HTTP exchange described by a [`CallSpec`].
///
/// Implementations return `Ok` for any response that reached the wire,
/// whatever its status; `Err` is reserved for network-level failures.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn execute(&self, base_url: &str, spec: &CallSpec) -> Result<CallResponse, ClientError>;
}

/// Production transport backed by a shared `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given request timeout.
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("resilient-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Build a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallTransport for HttpTransport {
    async fn execute(&self, base_url: &str, spec: &CallSpec) -> Result<CallResponse, ClientError> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), spec.path);

        let mut request = self.client.request(spec.method.clone(), &url);
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(CallResponse { status, body })
    }
}
