//! In-process client for exercising a [`Router`] without binding a socket.
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! mount(&mut router, ListQueues::default(), MountOptions::default());
//!
//! let client = TestClient::new(router);
//! client
//!     .get("/api/queues")
//!     .await
//!     .assert_status(StatusCode::OK)
//!     .assert_header("content-type", "application/json; charset=utf-8");
//! ```

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use typedapi_core::request::{empty, full};
use typedapi_core::{Deadline, Response, Router, JSON_CONTENT_TYPE};

/// Sends requests straight into a router.
#[derive(Clone)]
pub struct TestClient {
    router: Arc<Router>,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Send a POST with `body` encoded as JSON.
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> TestResponse {
        self.request(TestRequest::post(path).json(body)).await
    }

    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let TestRequest {
            method,
            path,
            headers,
            body,
            deadline,
        } = req;

        let mut http_req = http::Request::new(match body {
            Some(bytes) => full(bytes),
            None => empty(),
        });
        *http_req.method_mut() = method;
        *http_req.headers_mut() = headers;
        *http_req.uri_mut() = match path.parse() {
            Ok(uri) => uri,
            Err(err) => panic!("invalid request path {path:?}: {err}"),
        };
        if let Some(deadline) = deadline {
            http_req.extensions_mut().insert(deadline);
        }

        TestResponse::from_response(self.router.call(http_req).await).await
    }
}

/// Request builder for [`TestClient::request`].
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    deadline: Option<Deadline>,
}

impl TestRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
            deadline: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a header. Invalid names or values are skipped.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            key.parse::<header::HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Encode `body` as JSON and set the content type.
    ///
    /// # Panics
    ///
    /// If `body` cannot be serialized.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        let bytes = match serde_json::to_vec(body) {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to encode test request body: {err}"),
        };
        self.body = Some(Bytes::from(bytes));
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach an inbound deadline, as an upstream layer would.
    pub fn deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(Deadline(deadline));
        self
    }
}

#[derive(Deserialize)]
struct Envelope {
    message: String,
}

/// A fully buffered response with assertion helpers.
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();

        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// # Panics
    ///
    /// If the status differs.
    pub fn assert_status<S: Into<StatusCode>>(&self, expected: S) -> &Self {
        let expected = expected.into();
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// # Panics
    ///
    /// If the header is missing or differs.
    pub fn assert_header(&self, key: &str, expected: &str) -> &Self {
        let actual = self
            .headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        assert_eq!(
            actual, expected,
            "Expected header '{}' to be '{}', got '{}'",
            key, expected, actual
        );
        self
    }

    /// # Panics
    ///
    /// If the body is not JSON or does not equal `expected`.
    pub fn assert_json<T>(&self, expected: &T) -> &Self
    where
        T: DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let actual: T = match self.json() {
            Ok(actual) => actual,
            Err(err) => panic!("Failed to parse response body as JSON: {err}. Body: {}", self.text()),
        };
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// # Panics
    ///
    /// If the body does not contain `expected`.
    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(expected),
            "Expected body to contain '{}', got '{}'",
            expected,
            body
        );
        self
    }

    /// Assert an error envelope: the status, the JSON content type, and a
    /// body of exactly `{"message": expected}`.
    ///
    /// # Panics
    ///
    /// If any of the three differ.
    pub fn assert_envelope<S: Into<StatusCode>>(&self, status: S, expected: &str) -> &Self {
        self.assert_status(status)
            .assert_header("content-type", JSON_CONTENT_TYPE);

        let value: serde_json::Value = match self.json() {
            Ok(value) => value,
            Err(err) => panic!("error envelope is not JSON: {err}. Body: {}", self.text()),
        };
        let object = value.as_object().map(|o| o.len());
        assert_eq!(object, Some(1), "error envelope has extra fields: {value}");

        let envelope: Envelope = match serde_json::from_value(value) {
            Ok(envelope) => envelope,
            Err(err) => panic!("error envelope has no message: {err}"),
        };
        assert_eq!(envelope.message, expected);
        self
    }
}
