//! Response types for typedapi
//!
//! Endpoints never build responses by hand. The pipeline encodes their typed
//! response as JSON, or, for response types implementing
//! [`RespondRaw`](crate::RespondRaw), hands them a [`ResponseWriter`] to fill
//! in directly.

use bytes::{Bytes, BytesMut};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use std::io;

/// Content type of every JSON body written by the pipeline.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP Response type
pub type Response = http::Response<Full<Bytes>>;

/// Trait for types that can be converted into an HTTP response
pub trait IntoResponse {
    /// Convert self into a Response
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        ResponseWriter::into_response(self)
    }
}

/// Response sink handed to error envelopes and raw responders.
///
/// Mirrors the usual write-header-then-body discipline: the first status
/// written sticks, and writing body bytes without a status commits `200 OK`.
///
/// ```rust
/// use std::io::Write;
/// use typedapi_core::ResponseWriter;
/// use http::StatusCode;
///
/// let mut w = ResponseWriter::new();
/// w.headers_mut().insert("content-type", "text/csv".parse().unwrap());
/// w.write_header(StatusCode::OK);
/// writeln!(w, "id,name").unwrap();
///
/// let response = w.into_response();
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Convenience for setting `Content-Type`.
    pub fn set_content_type(&mut self, value: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }

    /// Commit the status code. Later calls are ignored with a warning.
    pub fn write_header(&mut self, status: StatusCode) {
        match self.status {
            Some(existing) => {
                tracing::warn!(
                    existing = existing.as_u16(),
                    ignored = status.as_u16(),
                    "superfluous write_header call"
                );
            }
            None => self.status = Some(status),
        }
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Finish the response.
    pub fn into_response(self) -> Response {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Plain text response used by the router for requests that never reach an
/// endpoint.
pub(crate) fn plain_text(status: StatusCode, text: &'static str) -> Response {
    let mut w = ResponseWriter::new();
    w.set_content_type("text/plain; charset=utf-8");
    w.write_header(status);
    w.body.extend_from_slice(text.as_bytes());
    w.into_response()
}
