//! Per-request context carrying the request deadline.
//!
//! The pipeline derives one [`Context`] per request and hands it to the
//! endpoint. Cancellation is cooperative: handlers poll [`Context::err`] (or
//! `?` on [`Context::check`]) before doing expensive work, and can race long
//! operations against [`Context::done`].
//!
//! ```rust
//! use std::time::Duration;
//! use typedapi_core::Context;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = Context::with_timeout(Duration::from_secs(10));
//! assert!(ctx.check().is_ok());
//! assert!(ctx.remaining().unwrap() <= Duration::from_secs(10));
//! # }
//! ```

use std::time::Duration;
use tokio::time::Instant;

/// Inbound deadline set by the host (or a middleware) as a request extension.
///
/// The pipeline never extends it: the effective deadline is the earlier of
/// this and its own configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(pub Instant);

/// Reason a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never expires.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derive a child that expires after `timeout`, or at the parent's
    /// deadline if that comes first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        Self::with_deadline(match self.deadline {
            Some(parent) => parent.min(own),
            None => own,
        })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Some` once the context is done.
    pub fn err(&self) -> Option<ContextError> {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves when the deadline passes. Never resolves for a background
    /// context.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
