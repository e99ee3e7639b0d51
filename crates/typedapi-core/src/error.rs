//! Error envelope for typedapi
//!
//! Every failed request is answered with one [`ApiError`]: a public message, a
//! status code fixed by its [`ErrorKind`], and an optional internal cause
//! that only ever reaches the logs.
//!
//! ```json
//! {"message": "Field 'message' is required."}
//! ```

use crate::response::{IntoResponse, Response, ResponseWriter, JSON_CONTENT_TYPE};
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Boxed error returned by endpoint handlers and capability hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for typedapi operations
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// The closed set of error kinds an endpoint can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 400, malformed or invalid input, or a safely reinterpreted backend failure.
    BadRequest,
    /// 401, raised by handler logic.
    Unauthorized,
    /// 404, raised by handler logic.
    NotFound,
    /// 413, the request body exceeded the configured limit.
    RequestEntityTooLarge,
    /// 500, anything unclassified.
    InternalServerError,
    /// 503, the request deadline passed.
    ServiceUnavailable,
}

impl ErrorKind {
    /// The HTTP status code of this kind.
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RequestEntityTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Classified API error
///
/// Handlers return these (boxed into [`BoxError`]) to pick the response
/// themselves; the pipeline builds them for every other failure.
///
/// ```rust
/// use typedapi_core::{ApiError, ErrorKind};
///
/// let err = ApiError::not_found(format!("Queue '{}' not found.", "default"));
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert_eq!(err.status().as_u16(), 404);
/// ```
#[derive(Clone)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    internal: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

/// JSON representation of an API error response
#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl ApiError {
    /// Create a new API error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal: None,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Create a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a 413 Request Entity Too Large error
    pub fn request_entity_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestEntityTooLarge, message)
    }

    /// Create a 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    /// Create a 503 Service Unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Attach a cause for operators. It is logged, never sent to the caller.
    pub fn with_internal_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.internal = Some(Arc::from(cause.into()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// The public, caller-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn internal_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.internal.as_deref()
    }

    /// Serialize the public body: `{"message": ...}`.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&ErrorBody {
            message: &self.message,
        })
    }

    /// Write the error to a response. Failures are logged, not retried.
    pub fn write(&self, w: &mut ResponseWriter) {
        w.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        w.write_header(self.status());

        let body = match self.to_json() {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "error marshaling API error");
                return;
            }
        };

        if let Err(err) = w.write_all(&body) {
            tracing::error!(error = %err, "error writing API error");
        }
    }
}

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("internal", &self.internal.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.internal
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Two envelopes are equal when callers would see the same response; the
/// internal cause is ignored.
impl PartialEq for ApiError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut w = ResponseWriter::new();
        self.write(&mut w);
        w.into_response()
    }
}

impl From<typedapi_validate::ValidationError> for ApiError {
    fn from(err: typedapi_validate::ValidationError) -> Self {
        let message = typedapi_validate::Validator::shared().first_violation_message(&err);
        ApiError::bad_request(message).with_internal_cause(err)
    }
}
