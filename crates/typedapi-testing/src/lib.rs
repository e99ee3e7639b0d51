//! Testing utilities for typedapi
//!
//! - [`invoke_handler`] / [`invoke_endpoint`] call a handler directly, with the
//!   request and response validation the pipeline would apply.
//! - [`TestClient`] sends requests through a [`Router`](typedapi_core::Router)
//!   in process and returns a [`TestResponse`] with fluent assertions.
//! - [`CapturedLogs`] collects log output for assertions.

mod client;
mod invoke;
mod logs;

pub use client::{TestClient, TestRequest, TestResponse};
pub use invoke::{invoke_endpoint, invoke_handler, ResponseValidationError};
pub use logs::CapturedLogs;
