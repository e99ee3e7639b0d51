//! Middleware infrastructure for typedapi
//!
//! A [`LayerStack`] wraps an endpoint's handler before it is registered.
//! Pass one through [`MountOptions`](crate::MountOptions).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use typedapi_core::middleware::{DeadlineLayer, LayerStack};
//! use typedapi_core::{mount, MountOptions, Router};
//!
//! let mut router = Router::new();
//! let stack = LayerStack::new().layer(DeadlineLayer::new(Duration::from_secs(2)));
//! mount(&mut router, ListQueues::default(), MountOptions::new().middleware(stack));
//! ```

mod deadline;
mod layer;

pub use deadline::DeadlineLayer;
pub use layer::{BoxedNext, LayerStack, MiddlewareLayer};
