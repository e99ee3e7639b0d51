use super::layer::{BoxedNext, MiddlewareLayer};
use crate::context::Deadline;
use crate::request::Request;
use crate::response::Response;
use crate::router::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

/// Stamps a [`Deadline`] on each request, `budget` from its arrival.
///
/// An earlier deadline already on the request is kept.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineLayer {
    budget: Duration,
}

impl DeadlineLayer {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl MiddlewareLayer for DeadlineLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture<Response> {
        let own = Instant::now() + self.budget;
        let deadline = match req.extensions().get::<Deadline>() {
            Some(Deadline(existing)) => (*existing).min(own),
            None => own,
        };
        req.extensions_mut().insert(Deadline(deadline));
        next(req)
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(*self)
    }
}
