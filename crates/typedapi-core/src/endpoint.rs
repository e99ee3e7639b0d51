//! The endpoint contract.
//!
//! An endpoint is a typed request, a typed response, metadata saying where it
//! is mounted, and an async `execute`. Everything around `execute` (decoding,
//! validation, timeouts, error envelopes) is the pipeline's job.
//!
//! ```rust
//! use async_trait::async_trait;
//! use http::StatusCode;
//! use serde::{Deserialize, Serialize};
//! use typedapi_core::{
//!     ApiRequest, ApiResponse, BoxError, Context, Endpoint, EndpointBase, EndpointMeta,
//! };
//! use validator::Validate;
//!
//! #[derive(Default, Deserialize, Validate)]
//! struct PauseQueueRequest {
//!     #[validate(required)]
//!     name: Option<String>,
//! }
//! impl ApiRequest for PauseQueueRequest {}
//!
//! #[derive(Serialize, Validate)]
//! struct PauseQueueResponse {
//!     paused: bool,
//! }
//! impl ApiResponse for PauseQueueResponse {}
//!
//! #[derive(Default)]
//! struct PauseQueue {
//!     base: EndpointBase,
//! }
//!
//! #[async_trait]
//! impl Endpoint for PauseQueue {
//!     type Request = PauseQueueRequest;
//!     type Response = PauseQueueResponse;
//!
//!     fn meta(&self) -> EndpointMeta {
//!         EndpointMeta::new("PUT /api/queues/pause", StatusCode::OK)
//!     }
//!
//!     fn base(&self) -> &EndpointBase {
//!         &self.base
//!     }
//!
//!     async fn execute(
//!         &self,
//!         ctx: Context,
//!         _req: PauseQueueRequest,
//!     ) -> Result<PauseQueueResponse, BoxError> {
//!         ctx.check()?;
//!         Ok(PauseQueueResponse { paused: true })
//!     }
//! }
//! ```

use crate::context::Context;
use crate::error::BoxError;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::router::{parse_pattern, PatternError};
use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::OnceLock;
use tracing::Dispatch;
use typedapi_validate::{Validate, WireNames};

/// Where an endpoint is mounted and what it answers with on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMeta {
    /// `"METHOD /path"`, with `{name}` path parameters.
    pub pattern: String,
    /// Status written on success.
    pub status_code: StatusCode,
}

impl EndpointMeta {
    pub fn new(pattern: impl Into<String>, status_code: StatusCode) -> Self {
        Self {
            pattern: pattern.into(),
            status_code,
        }
    }

    /// Method and path of the pattern.
    pub fn route(&self) -> Result<(Method, &str), PatternError> {
        parse_pattern(&self.pattern)
    }

    /// Like [`route`](Self::route), but a malformed pattern is a
    /// configuration bug.
    ///
    /// # Panics
    ///
    /// If the pattern is empty or malformed.
    pub(crate) fn validated_route(&self) -> (Method, &str) {
        match self.route() {
            Ok(route) => route,
            Err(err) => panic!("invalid endpoint metadata: {err}"),
        }
    }
}

/// Injection slots every endpoint embeds.
///
/// Filled once by registration; later writes are ignored.
#[derive(Debug, Default)]
pub struct EndpointBase {
    logger: OnceLock<Dispatch>,
    meta: OnceLock<EndpointMeta>,
}

impl EndpointBase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A typed API endpoint.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    type Request: ApiRequest;
    type Response: ApiResponse;

    /// Metadata for registration. Called once per mount.
    fn meta(&self) -> EndpointMeta;

    /// The endpoint's injection slots.
    fn base(&self) -> &EndpointBase;

    async fn execute(&self, ctx: Context, req: Self::Request) -> Result<Self::Response, BoxError>;

    fn set_logger(&self, logger: Dispatch) {
        if self.base().logger.set(logger).is_err() {
            tracing::warn!("endpoint logger already set, keeping the first one");
        }
    }

    fn set_meta(&self, meta: EndpointMeta) {
        if let Err(meta) = self.base().meta.set(meta) {
            tracing::warn!(pattern = %meta.pattern, "endpoint metadata already set, keeping the first one");
        }
    }

    /// The injected logger, or the current default dispatcher.
    fn logger(&self) -> Dispatch {
        match self.base().logger.get() {
            Some(logger) => logger.clone(),
            None => tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Metadata injected at registration, `None` before mounting.
    fn registered_meta(&self) -> Option<&EndpointMeta> {
        self.base().meta.get()
    }
}

/// Request types accepted by endpoints.
///
/// Decoded from a JSON object (or left at `Default` for an empty body) and
/// validated before the endpoint runs.
pub trait ApiRequest: DeserializeOwned + Default + Validate + Send + 'static {
    /// Opt into raw extraction by returning `Some(self)`.
    fn raw_extractor(&mut self) -> Option<&mut dyn ExtractRaw> {
        None
    }

    /// Names used for fields in validation messages. Defaults to the serde
    /// names, so `rename_all` and case-only `rename`s are followed.
    /// Override to declare renames that are not a case change.
    fn wire_names() -> WireNames {
        WireNames::of::<Self>()
    }
}

/// Response types returned by endpoints.
pub trait ApiResponse: Serialize + Validate + Send + 'static {
    /// Opt into raw responses by returning `Some(self)`.
    fn raw_responder(&self) -> Option<&dyn RespondRaw> {
        None
    }
}

/// Pulls values the JSON decoder cannot see: path parameters, headers, the
/// raw body.
///
/// Runs after decoding and before validation. Errors are passed on
/// unchanged, so returning an [`ApiError`](crate::ApiError) picks the
/// response.
pub trait ExtractRaw {
    fn extract_raw(&mut self, req: &Request) -> Result<(), BoxError>;
}

/// Writes the response itself instead of being JSON encoded.
///
/// The implementation owns status, headers and body. If it fails, whatever
/// it wrote is discarded and an error envelope is sent instead.
pub trait RespondRaw {
    fn respond_raw(&self, w: &mut ResponseWriter) -> Result<(), BoxError>;
}

/// Request or response with no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl Validate for Empty {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        Ok(())
    }
}

impl ApiRequest for Empty {}
impl ApiResponse for Empty {}

/// An endpoint made from metadata and an async function.
pub struct FnEndpoint<F, Req, Res> {
    meta: EndpointMeta,
    handler: F,
    base: EndpointBase,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<F, Req, Res> FnEndpoint<F, Req, Res> {
    pub fn new(meta: EndpointMeta, handler: F) -> Self {
        Self {
            meta,
            handler,
            base: EndpointBase::new(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, Req, Res> Endpoint for FnEndpoint<F, Req, Res>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
    Req: ApiRequest,
    Res: ApiResponse,
{
    type Request = Req;
    type Response = Res;

    fn meta(&self) -> EndpointMeta {
        self.meta.clone()
    }

    fn base(&self) -> &EndpointBase {
        &self.base
    }

    async fn execute(&self, ctx: Context, req: Req) -> Result<Res, BoxError> {
        (self.handler)(ctx, req).await
    }
}
