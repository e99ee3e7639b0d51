//! Request types for typedapi

use crate::error::BoxError;
use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited};
use std::collections::HashMap;

/// Request body type accepted by the router.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// A body holding `bytes`.
pub fn full(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// An empty body.
pub fn empty() -> Body {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Failure reading a request body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("error reading request body: {0}")]
    Read(#[source] BoxError),
    #[error("request body is unavailable after a failed read")]
    Unavailable,
}

enum BodyState {
    Streaming(Body),
    Buffered(Bytes),
    Failed,
}

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request. The body starts
/// out streaming; once the pipeline has read it the bytes stay buffered and
/// can be read again through [`Request::body`].
pub struct Request {
    pub(crate) parts: Parts,
    body: BodyState,
    pub(crate) path_params: HashMap<String, String>,
}

impl Request {
    /// Create a new request from parts
    pub fn new(parts: Parts, body: Body, path_params: HashMap<String, String>) -> Self {
        Self {
            parts,
            body: BodyState::Streaming(body),
            path_params,
        }
    }

    /// Wrap an `http::Request` that did not go through the router.
    pub fn from_http(req: http::Request<Body>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, HashMap::new())
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Get the query string
    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Get path parameters
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Get a specific path parameter
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// The buffered body, once it has been read.
    ///
    /// Always `None` for requests whose body was never read, GET requests
    /// included, and for bodies whose read failed.
    pub fn body(&self) -> Option<&Bytes> {
        match &self.body {
            BodyState::Buffered(bytes) => Some(bytes),
            BodyState::Streaming(_) | BodyState::Failed => None,
        }
    }

    /// Read the whole body, up to `limit` bytes, and keep it buffered.
    ///
    /// Calling this again returns the buffered bytes, or
    /// [`BodyError::Unavailable`] if the first read failed.
    pub async fn buffer_body(&mut self, limit: usize) -> Result<Bytes, BodyError> {
        let body = match std::mem::replace(&mut self.body, BodyState::Failed) {
            BodyState::Buffered(bytes) => {
                self.body = BodyState::Buffered(bytes.clone());
                return Ok(bytes);
            }
            BodyState::Failed => return Err(BodyError::Unavailable),
            BodyState::Streaming(body) => body,
        };

        // Boxed with an explicit `Send` bound so the compiler proves `Send` here,
        // with concrete lifetimes, rather than inside callers' futures.
        let collect: std::pin::Pin<
            Box<
                dyn std::future::Future<
                        Output = Result<http_body_util::Collected<Bytes>, BoxError>,
                    > + Send,
            >,
        > = Box::pin(Limited::new(body, limit).collect());
        let collected = collect.await.map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                BodyError::TooLarge { limit }
            } else {
                BodyError::Read(err)
            }
        })?;

        let bytes = collected.to_bytes();
        self.body = BodyState::Buffered(bytes.clone());
        Ok(bytes)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .field("path_params", &self.path_params)
            .finish()
    }
}
