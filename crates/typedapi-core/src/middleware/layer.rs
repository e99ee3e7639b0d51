//! Middleware layers wrapped around endpoint handlers

use crate::request::Request;
use crate::response::Response;
use crate::router::{BoxFuture, BoxedHandler};
use std::sync::Arc;

/// A boxed next function for middleware chains
pub type BoxedNext = BoxedHandler;

/// Trait for middleware that can wrap an endpoint
///
/// ```rust
/// use typedapi_core::middleware::{BoxedNext, MiddlewareLayer};
/// use typedapi_core::{BoxFuture, Request, Response};
///
/// #[derive(Clone)]
/// struct PoweredBy;
///
/// impl MiddlewareLayer for PoweredBy {
///     fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response> {
///         Box::pin(async move {
///             let mut response = next(req).await;
///             response
///                 .headers_mut()
///                 .insert("x-powered-by", http::HeaderValue::from_static("typedapi"));
///             response
///         })
///     }
///
///     fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
///         Box::new(self.clone())
///     }
/// }
/// ```
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response>;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a layer, builder style.
    pub fn layer<L: MiddlewareLayer>(mut self, layer: L) -> Self {
        self.push(Box::new(layer));
        self
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers are executed in the order they are added (outermost first).
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Add a middleware layer to the beginning of the stack
    ///
    /// This layer will be executed first (outermost).
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture<Response> {
        if self.layers.is_empty() {
            return handler(req);
        }

        // Build the chain from inside out so the first layer pushed runs first
        let mut next = handler;

        for layer in self.layers.iter().rev() {
            let layer = layer.clone_box();
            let current_next = next;
            next = Arc::new(move |req: Request| {
                let layer = layer.clone_box();
                let next = current_next.clone();
                Box::pin(async move { layer.call(req, next).await }) as BoxFuture<Response>
            });
        }

        next(req)
    }

    /// Wrap `handler` so every call runs through the stack.
    pub fn wrap(&self, handler: BoxedHandler) -> BoxedHandler {
        if self.layers.is_empty() {
            return handler;
        }

        let stack = self.clone();
        Arc::new(move |req: Request| stack.execute(req, handler.clone()))
    }
}
