use async_trait::async_trait;
use friendscan_core::TransportConfig;
use reqwest::Client;
use tracing::debug;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `application/json; charset=UTF-8`
    Json(Vec<u8>),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// The method follows the body: POST when there is one, GET otherwise.
    pub fn new(url: impl Into<String>, body: Option<RequestBody>) -> Self {
        let method = if body.is_some() {
            Method::Post
        } else {
            Method::Get
        };
        Self {
            method,
            url: url.into(),
            body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, None)
    }

    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(url, Some(RequestBody::Json(body)))
    }

    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(url, Some(RequestBody::Form(fields)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns the raw status and body.
///
/// Implementations own cookie state and timeouts; callers never see either.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport with a shared cookie store.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = ?request.method, url = %request.url, "sending request");

        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let builder = match request.body {
            Some(RequestBody::Json(bytes)) => builder
                .header("Content-Type", "application/json; charset=UTF-8")
                .body(bytes),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_follows_body() {
        assert_eq!(HttpRequest::get("http://x").method, Method::Get);
        assert_eq!(
            HttpRequest::post_json("http://x", b"{}".to_vec()).method,
            Method::Post
        );
        let form = HttpRequest::post_form("http://x", [("t", "webwx")]);
        assert_eq!(form.method, Method::Post);
        assert_eq!(
            form.body,
            Some(RequestBody::Form(vec![("t".to_string(), "webwx".to_string())]))
        );
    }

    #[test]
    fn test_transport_builds_from_default_config() {
        assert!(HttpTransport::new(&TransportConfig::default()).is_ok());
    }
}
