use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::ConnectionConfig,
    error::{Result, XnatError},
};

/// Body of a POST or PUT request.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Sent as `text/plain`.
    Text(String),
    /// Serialized and sent as `application/json`.
    Json(Value),
}

/// How long a POST may take before it is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The timeout configured on the session.
    Default,
    /// No timeout at all, for launches that may run for a long time.
    Unbounded,
}

/// Connection to an XNAT server.
///
/// Both the [UidImporter](crate::UidImporter) and the
/// [CommandUtility](crate::CommandUtility) talk to the server exclusively
/// through this trait, which lets tests swap in canned responses.
#[async_trait]
pub trait XnatSession: Send + Sync {
    /// GET `path` with the given query parameters and decode the JSON body.
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value>;

    /// POST `payload` to `path`. An empty response body decodes to `Null`.
    async fn post(&self, path: &str, payload: Payload, wait: Wait) -> Result<Value>;

    /// PUT `payload` to `path`, only checking the response status.
    async fn put(&self, path: &str, payload: Payload) -> Result<()>;
}

/// [XnatSession] backed by a [reqwest::Client] with HTTP basic auth.
pub struct HttpSession {
    client: Client,
    server: String,
    user: String,
    password: String,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        if config.server.is_empty() {
            return Err(XnatError::Config("No XNAT server address provided.".to_string()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| XnatError::Transport {
                url: config.server.clone(),
                source,
            })?;

        Ok(Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.server, path)
        } else {
            format!("{}/{}", self.server, path)
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, Some(&self.password))
    }

    fn with_payload(builder: RequestBuilder, payload: Payload) -> RequestBuilder {
        match payload {
            Payload::Text(text) => builder
                .header(header::CONTENT_TYPE, "text/plain")
                .body(text),
            Payload::Json(value) => builder.json(&value),
        }
    }

    async fn send(method: &'static str, url: &str, builder: RequestBuilder) -> Result<Response> {
        let start = std::time::Instant::now();
        let response = builder.send().await.map_err(|source| XnatError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!("{} {} : {} in {:?}", method, url, response.status(), start.elapsed());

        if !response.status().is_success() {
            return Err(XnatError::Status {
                method,
                url: url.to_string(),
                status: response.status(),
            });
        }
        Ok(response)
    }

    /// Decodes a response body. `strict` rejects bodies that are not JSON,
    /// otherwise they are returned as a JSON string.
    async fn decode(url: &str, response: Response, strict: bool) -> Result<Value> {
        let text = response.text().await.map_err(|source| XnatError::Transport {
            url: url.to_string(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) if strict => Err(XnatError::response(url, e.to_string())),
            Err(_) => Ok(Value::String(text)),
        }
    }
}

#[async_trait]
impl XnatSession for HttpSession {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(path);
        let builder = self
            .authorized(self.client.get(&url))
            .query(query)
            .timeout(self.timeout);
        let response = Self::send("GET", &url, builder).await?;
        Self::decode(&url, response, true).await
    }

    async fn post(&self, path: &str, payload: Payload, wait: Wait) -> Result<Value> {
        let url = self.url(path);
        let mut builder = Self::with_payload(self.authorized(self.client.post(&url)), payload);
        if wait == Wait::Default {
            builder = builder.timeout(self.timeout);
        }
        let response = Self::send("POST", &url, builder).await?;
        Self::decode(&url, response, false).await
    }

    async fn put(&self, path: &str, payload: Payload) -> Result<()> {
        let url = self.url(path);
        let builder = Self::with_payload(self.authorized(self.client.put(&url)), payload)
            .timeout(self.timeout);
        Self::send("PUT", &url, builder).await?;
        Ok(())
    }
}
