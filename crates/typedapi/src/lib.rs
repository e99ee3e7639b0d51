//! # typedapi
//!
//! Typed HTTP endpoints. An endpoint is a request type, a response type, a
//! route pattern with a success status, and an async handler. Mounting it on
//! a [`Router`] gives it the full request pipeline:
//!
//! - JSON decoding of the request body (`GET` bodies are ignored);
//! - optional raw extraction of path parameters, headers or the raw body;
//! - declarative validation with human-readable messages;
//! - a per-request deadline;
//! - JSON encoding of the response, or a raw response writer;
//! - a uniform `{"message": ...}` error envelope for every failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use typedapi::prelude::*;
//!
//! #[derive(Default, Deserialize, Validate)]
//! struct CreateQueue {
//!     #[validate(required, length(min = 1, max = 64))]
//!     name: Option<String>,
//! }
//! impl ApiRequest for CreateQueue {}
//!
//! #[derive(Serialize, Validate)]
//! struct Queue {
//!     name: String,
//! }
//! impl ApiResponse for Queue {}
//!
//! async fn create_queue(_ctx: Context, req: CreateQueue) -> Result<Queue, BoxError> {
//!     Ok(Queue { name: req.name.unwrap_or_default() })
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), BoxError> {
//!     let mut router = Router::new();
//!     mount_fn(
//!         &mut router,
//!         EndpointMeta::new("POST /api/queues", StatusCode::CREATED),
//!         create_queue,
//!         MountOptions::default(),
//!     );
//!     typedapi::serve(router, "127.0.0.1:8080").await
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `sqlx` - classify SQLx connection and privilege errors into public messages
//! - `testing` - re-export `typedapi-testing` as [`testing`]
//! - `full` - all of the above

pub use typedapi_core::*;

pub use typedapi_validate::{
    FieldError, Nullable, Translator, ValidationError, Validator, WireNames,
};

#[cfg(feature = "testing")]
pub use typedapi_testing as testing;

// Re-exported so derives and the `Endpoint` trait work without extra dependencies.
pub use async_trait::async_trait;
pub use validator;

/// Prelude module - import everything you need with `use typedapi::prelude::*`
pub mod prelude {
    pub use typedapi_core::{
        mount,
        mount_fn,
        // Errors
        ApiError,
        // Endpoint contract
        ApiRequest,
        ApiResponse,
        BoxError,
        Context,
        Empty,
        Endpoint,
        EndpointBase,
        EndpointMeta,
        ErrorKind,
        ExtractRaw,
        MountOptions,
        PipelineConfig,
        Request,
        RespondRaw,
        ResponseWriter,
        Router,
    };

    pub use typedapi_validate::{Nullable, Validator};
    pub use validator::Validate;

    pub use async_trait::async_trait;
    pub use http::StatusCode;
    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, trace, warn};
}
