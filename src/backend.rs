use bytes::Bytes;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl BackendResponse {
    /// Turns a non-2xx answer into [`BackendError::Status`].
    pub fn error_for_status(self, url: String) -> Result<Self, BackendError> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(BackendError::Status {
            url,
            status: self.status,
            body: String::from_utf8_lossy(&self.body).into_owned(),
        })
    }
}

/// JSON-over-HTTP client for the presentation backend.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: HttpClient,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            http: HttpClient::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `body` as JSON (if any) and returns the raw answer, whatever its
    /// status.
    pub async fn call<B>(
        &self,
        path: &str,
        method: Method,
        body: Option<&B>,
    ) -> Result<BackendResponse, BackendError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        tracing::debug!(%method, %url, "calling backend");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(BackendResponse { status, body })
        }
        .await;

        result.map_err(|source| BackendError::Request { url, source })
    }

    pub async fn get(&self, path: &str) -> Result<BackendResponse, BackendError> {
        self.call::<()>(path, Method::GET, None).await
    }

    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<BackendResponse, BackendError>
    where
        B: Serialize + ?Sized,
    {
        self.call(path, Method::POST, Some(body)).await
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub(crate) async fn spawn_backend(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::spawn_backend;
    use super::*;
    use axum::Json;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use serde_json::{json, Value};

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(
            client.url("/presentation/preview"),
            "http://localhost:8000/presentation/preview"
        );
    }

    #[tokio::test]
    async fn post_json_sends_body_and_returns_raw_answer() {
        let app = axum::Router::new().route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }),
        );
        let client = BackendClient::new(&spawn_backend(app).await);

        let response = client.post_json("/echo", &json!({"a": 1})).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!({"received": {"a": 1}}));
    }

    #[tokio::test]
    async fn non_success_status_is_returned_not_raised() {
        let app = axum::Router::new().route(
            "/broken",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "down") }),
        );
        let client = BackendClient::new(&spawn_backend(app).await);

        let response = client.get("/broken").await.unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

        let err = response
            .error_for_status(client.url("/broken"))
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Status { .. }));
        assert!(err.to_string().contains("down"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let client = BackendClient::new("http://127.0.0.1:9");
        let err = client.get("/slides").await.err().unwrap();
        assert!(matches!(err, BackendError::Request { .. }));
    }
}
