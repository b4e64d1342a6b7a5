//! HTTP transport for the remote store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use super::{RemoteError, Transport};

/// User-Agent sent with every request
const USER_AGENT: &str = concat!("scrumsync/", env!("CARGO_PKG_VERSION"));

/// Transport that talks to the remote store over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `http://localhost:4125`).
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        query: Option<(&str, String)>,
        body: Option<Value>,
        not_found: (&str, &str),
    ) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some((key, value)) = query {
            request = request.query(&[(key, value)]);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        tracing::debug!(%method, %url, "remote request");
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("[{} {}] {}", method, path, e)))?;

        let status = response.status();
        let text = response.text().await;
        if !status.is_success() {
            return Err(status_error(status, &method, &path, text.unwrap_or_default(), not_found));
        }
        let text = text.map_err(|e| {
            RemoteError::Unavailable(format!("[{} {}] reading body: {}", method, path, e))
        })?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(format!("[{} {}] {}", method, path, e)))
    }
}

/// Map a non-success status onto the error taxonomy.
fn status_error(
    status: StatusCode,
    method: &Method,
    path: &str,
    body: String,
    (collection, id): (&str, &str),
) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        s if s.is_client_error() => {
            RemoteError::ValidationRejected(format!("[{} {}] HTTP {}: {}", method, path, s.as_u16(), body))
        }
        s => RemoteError::Unavailable(format!("[{} {}] HTTP {}: {}", method, path, s.as_u16(), body)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list(&self, collection: &str, per_page: u32) -> Result<Value, RemoteError> {
        self.send(
            Method::GET,
            format!("/{}", collection),
            Some(("per_page", per_page.to_string())),
            None,
            (collection, ""),
        )
        .await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Value, RemoteError> {
        self.send(Method::GET, format!("/{}/{}", collection, id), None, None, (collection, id))
            .await
    }

    async fn create(&self, collection: &str, body: Value) -> Result<Value, RemoteError> {
        self.send(Method::POST, format!("/{}", collection), None, Some(body), (collection, ""))
            .await
    }

    async fn replace(&self, collection: &str, id: &str, body: Value) -> Result<Value, RemoteError> {
        self.send(
            Method::PUT,
            format!("/{}/{}", collection, id),
            None,
            Some(body),
            (collection, id),
        )
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.send(Method::DELETE, format!("/{}/{}", collection, id), None, None, (collection, id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://localhost:4125/", None).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:4125");
    }

    #[test]
    fn test_status_mapping() {
        let get = Method::GET;
        let err = status_error(StatusCode::NOT_FOUND, &get, "/tasks/9", String::new(), ("tasks", "9"));
        assert_eq!(
            err,
            RemoteError::NotFound {
                collection: "tasks".to_string(),
                id: "9".to_string()
            }
        );

        let err = status_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            &Method::POST,
            "/tasks",
            "title required".to_string(),
            ("tasks", ""),
        );
        assert_eq!(err.category(), "validation_rejected");

        let err = status_error(StatusCode::BAD_GATEWAY, &get, "/tasks", String::new(), ("tasks", ""));
        assert_eq!(err.category(), "remote_unavailable");
    }
}
