use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` pairs, encoded in the given order.
    Form(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Sent in this order.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(RequestBody::Form(form)),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Looks up a form field; used by fakes and logging.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            Some(RequestBody::Form(pairs)) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parses the body as JSON. Empty or malformed bodies are parse errors, not network errors.
    pub fn json(&self) -> Result<Value> {
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            return Err(ScraperError::parse(
                &self.url,
                format!("empty response body (HTTP {})", self.status),
            ));
        }
        serde_json::from_str(trimmed).map_err(|e| ScraperError::parse(&self.url, e))
    }
}

/// Every portal request goes through here, so browser-fingerprint concerns stay
/// out of the adapters and tests can swap in a scripted fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns a 2xx response or an error after the implementation's retry policy is exhausted.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse>;
}
