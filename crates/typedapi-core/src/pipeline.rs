//! Mounting endpoints and running them per request.
//!
//! [`mount`] registers an endpoint on a [`Router`]. Every matching request
//! then goes through the same steps, in order:
//!
//! 1. derive a [`Context`] whose deadline is the earlier of the inbound
//!    [`Deadline`] extension and the configured timeout;
//! 2. read and buffer the body, except for `GET`, whose body is ignored;
//! 3. decode the JSON object into the endpoint's request type (an empty body
//!    leaves it at `Default`);
//! 4. let the request type pull raw values ([`ExtractRaw`](crate::ExtractRaw));
//! 5. validate it;
//! 6. execute the endpoint;
//! 7. encode the response, or let it write itself
//!    ([`RespondRaw`](crate::RespondRaw)).
//!
//! Any failure goes through [`classify`] and is answered with exactly one
//! error envelope.

use crate::classify::classify;
use crate::config::PipelineConfig;
use crate::context::{Context, Deadline};
use crate::endpoint::{ApiRequest, ApiResponse, Endpoint, EndpointMeta, FnEndpoint};
use crate::error::{ApiError, BoxError};
use crate::middleware::LayerStack;
use crate::request::{BodyError, Request};
use crate::response::{IntoResponse, Response, ResponseWriter, JSON_CONTENT_TYPE};
use crate::router::{BoxFuture, BoxedHandler, Router};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument};
use typedapi_validate::{Validator, WireNames};

/// Failures inside the pipeline itself. Always classified as internal.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("error marshaling response JSON: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("error writing response: {0}")]
    Write(#[source] std::io::Error),
}

/// Per-registration options. `MountOptions::default()` is the usual choice.
#[derive(Clone, Default)]
pub struct MountOptions {
    /// Logger for this endpoint. Defaults to the dispatcher current at
    /// request time.
    pub logger: Option<Dispatch>,
    /// Middleware wrapped around the endpoint.
    pub middleware: Option<LayerStack>,
    /// Validator for requests. Defaults to [`Validator::shared`].
    pub validator: Option<Arc<Validator>>,
    pub config: PipelineConfig,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    pub fn middleware(mut self, stack: LayerStack) -> Self {
        self.middleware = Some(stack);
        self
    }

    pub fn validator(mut self, validator: Arc<Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }
}

/// Register `endpoint` on `router` and return it.
///
/// # Panics
///
/// If the endpoint's metadata has a malformed pattern, or the route
/// conflicts with one already registered.
pub fn mount<E>(router: &mut Router, endpoint: E, options: MountOptions) -> Arc<E>
where
    E: Endpoint,
{
    let endpoint = Arc::new(endpoint);

    let MountOptions {
        logger,
        middleware,
        validator,
        config,
    } = options;

    if let Some(logger) = &logger {
        endpoint.set_logger(logger.clone());
    }

    let meta = endpoint.meta();
    let (method, path) = {
        let (method, path) = meta.validated_route();
        (method, path.to_string())
    };
    endpoint.set_meta(meta.clone());

    tracing::debug!(pattern = %meta.pattern, status = meta.status_code.as_u16(), "mounting endpoint");

    let pipeline = Arc::new(Pipeline {
        endpoint: endpoint.clone(),
        meta,
        validator: validator.unwrap_or_else(Validator::shared),
        names: E::Request::wire_names(),
        config,
        logger,
    });

    let handler: BoxedHandler = Arc::new(move |req: Request| {
        Box::pin(pipeline.clone().handle(req)) as BoxFuture<Response>
    });
    let handler = match middleware {
        Some(stack) => stack.wrap(handler),
        None => handler,
    };

    router.route(method, &path, handler);
    endpoint
}

/// Register a plain async function as an endpoint.
///
/// ```rust
/// use http::StatusCode;
/// use typedapi_core::{mount_fn, BoxError, Context, Empty, EndpointMeta, MountOptions, Router};
///
/// async fn health(_ctx: Context, _req: Empty) -> Result<Empty, BoxError> {
///     Ok(Empty {})
/// }
///
/// let mut router = Router::new();
/// mount_fn(
///     &mut router,
///     EndpointMeta::new("GET /api/health", StatusCode::OK),
///     health,
///     MountOptions::default(),
/// );
/// assert_eq!(router.registered_routes(), vec!["GET /api/health"]);
/// ```
pub fn mount_fn<F, Fut, Req, Res>(
    router: &mut Router,
    meta: EndpointMeta,
    handler: F,
    options: MountOptions,
) -> Arc<FnEndpoint<F, Req, Res>>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, BoxError>> + Send + 'static,
    Req: ApiRequest,
    Res: ApiResponse,
{
    mount(router, FnEndpoint::new(meta, handler), options)
}

struct Pipeline<E> {
    endpoint: Arc<E>,
    meta: EndpointMeta,
    validator: Arc<Validator>,
    names: WireNames,
    config: PipelineConfig,
    logger: Option<Dispatch>,
}

impl<E> Pipeline<E>
where
    E: Endpoint,
{
    async fn handle(self: Arc<Self>, req: Request) -> Response {
        let logger = self.logger.clone();
        let run = async move {
            let span = tracing::info_span!("endpoint", pattern = %self.meta.pattern);
            self.run(req).instrument(span).await
        };

        match logger {
            Some(logger) => run.with_subscriber(logger).await,
            None => run.await,
        }
    }

    async fn run(&self, mut req: Request) -> Response {
        let own = Instant::now() + self.config.request_timeout();
        let deadline = match req.extensions().get::<Deadline>() {
            Some(Deadline(parent)) => (*parent).min(own),
            None => own,
        };
        let ctx = Context::with_deadline(deadline);

        let result = match tokio::time::timeout_at(deadline, self.process(ctx, &mut req)).await {
            Ok(result) => result,
            Err(elapsed) => Err(elapsed.into()),
        };

        match result {
            Ok(response) => response,
            Err(err) => classify(err).into_response(),
        }
    }

    async fn process(&self, ctx: Context, req: &mut Request) -> Result<Response, BoxError> {
        let mut decoded = E::Request::default();

        // GET bodies are never read, so their errors never surface.
        if *req.method() != Method::GET {
            let body = match req.buffer_body(self.config.body_limit).await {
                Ok(body) => body,
                Err(err @ BodyError::TooLarge { .. }) => {
                    return Err(ApiError::request_entity_too_large("Request entity too large.")
                        .with_internal_cause(err)
                        .into());
                }
                Err(err) => return Err(err.into()),
            };

            if !body.is_empty() {
                decoded = decode(&body)?;
            }
        }

        if let Some(extractor) = decoded.raw_extractor() {
            extractor.extract_raw(req)?;
        }

        if let Err(err) = self.validator.validate_named(&decoded, &self.names) {
            let message = self.validator.first_violation_message(&err);
            return Err(ApiError::bad_request(message).with_internal_cause(err).into());
        }

        let response = self.endpoint.execute(ctx, decoded).await?;

        respond(&response, self.meta.status_code)
    }
}

fn decode<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    match body.iter().copied().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | None => serde_json::from_slice(body).map_err(|err| {
            ApiError::bad_request(format!("Error decoding request body: {err}."))
                .with_internal_cause(err)
        }),
        Some(_) => Err(ApiError::bad_request(
            "Error decoding request body: expected a JSON object.",
        )),
    }
}

fn respond<R>(response: &R, status: StatusCode) -> Result<Response, BoxError>
where
    R: ApiResponse,
{
    let mut w = ResponseWriter::new();

    if let Some(raw) = response.raw_responder() {
        raw.respond_raw(&mut w)?;
        return Ok(w.into_response());
    }

    let body = serde_json::to_vec(response).map_err(PipelineError::Encode)?;
    w.set_content_type(JSON_CONTENT_TYPE);
    w.write_header(status);
    w.write_all(&body).map_err(PipelineError::Write)?;

    Ok(w.into_response())
}
