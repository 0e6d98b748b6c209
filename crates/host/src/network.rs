use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::Method;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl NetworkRequest {
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResponse {
    pub status: u16,
    pub body: String,
}

impl NetworkResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic blocking network request primitive.
pub trait Transport {
    fn send(&self, request: &NetworkRequest) -> Result<NetworkResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed building blocking http client")?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &NetworkRequest) -> Result<NetworkResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("invalid http method {}", request.method))?;
        let mut builder = self
            .http
            .request(method, &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .with_context(|| format!("failed sending request to {}", request.url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .with_context(|| format!("failed reading response body from {}", request.url))?;
        debug!(url = %request.url, status, "network request completed");
        Ok(NetworkResponse { status, body })
    }
}
