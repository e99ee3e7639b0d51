//! # typedapi Core
//!
//! The endpoint contract, the execution pipeline that runs it, the error
//! envelope every failure is answered with, and a small hyper host.
//!
//! This crate is not meant to be used directly. Use `typedapi` instead.

mod classify;
mod config;
mod context;
mod endpoint;
mod error;
pub mod middleware;
mod pipeline;
pub mod request;
mod response;
mod router;
mod server;

// Public API
pub use classify::{classify, find_in_chain, reinterpret, DependencyError, INSUFFICIENT_PRIVILEGE};
pub use config::{ConfigError, PipelineConfig, DEFAULT_BODY_LIMIT, DEFAULT_REQUEST_TIMEOUT, ENV_PREFIX};
pub use context::{Context, ContextError, Deadline};
pub use endpoint::{
    ApiRequest, ApiResponse, Empty, Endpoint, EndpointBase, EndpointMeta, ExtractRaw, FnEndpoint,
    RespondRaw,
};
pub use error::{ApiError, BoxError, ErrorKind, Result};
pub use pipeline::{mount, mount_fn, MountOptions, PipelineError};
pub use request::{Body, BodyError, Request};
pub use response::{IntoResponse, Response, ResponseWriter, JSON_CONTENT_TYPE};
pub use router::{parse_pattern, BoxFuture, BoxedHandler, PatternError, RouteConflictError, Router};
pub use server::{serve, serve_listener};
