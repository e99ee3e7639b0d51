//! Turning handler failures into error envelopes.
//!
//! Precedence, first match wins:
//!
//! 1. an [`ApiError`] anywhere in the source chain is sent as-is;
//! 2. a small allow-list of dependency failures is rewritten into a
//!    public-safe 400 that keeps the original as internal cause;
//! 3. deadline expiry becomes a 503 that invites a retry;
//! 4. everything else is a 500 whose message leaks nothing.

use crate::context::ContextError;
use crate::error::{ApiError, BoxError};
use std::error::Error as StdError;

/// SQLSTATE for insufficient privilege.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

pub(crate) const CONNECT_MESSAGE: &str =
    "There was a problem connecting to the configured database. Check logs for details.";
pub(crate) const PRIVILEGE_MESSAGE: &str =
    "Insufficient database privilege to perform this operation.";
pub(crate) const TIMEOUT_MESSAGE: &str = "Request timed out. Retrying the request might work.";
pub(crate) const INTERNAL_MESSAGE: &str = "Internal server error. Check logs for more information.";

/// Backend failures handlers can surface for reinterpretation.
///
/// Storage layers wrap their driver errors in this so the pipeline can tell
/// "could not connect" and "not allowed" apart from other failures.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("error connecting to {dependency}: {source}")]
    Connect {
        dependency: String,
        #[source]
        source: BoxError,
    },
    #[error("{dependency} rejected the operation (SQLSTATE {code}): {message}")]
    Rejected {
        dependency: String,
        code: String,
        message: String,
    },
}

impl DependencyError {
    pub fn connect(dependency: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            dependency: dependency.into(),
            source: source.into(),
        }
    }

    pub fn rejected(
        dependency: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            dependency: dependency.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    fn public_message(&self) -> Option<&'static str> {
        match self {
            Self::Connect { .. } => Some(CONNECT_MESSAGE),
            Self::Rejected { code, .. } if code == INSUFFICIENT_PRIVILEGE => {
                Some(PRIVILEGE_MESSAGE)
            }
            Self::Rejected { .. } => None,
        }
    }
}

#[cfg(feature = "sqlx")]
fn sqlx_public_message(err: &sqlx::Error) -> Option<&'static str> {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            Some(CONNECT_MESSAGE)
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(INSUFFICIENT_PRIVILEGE) => {
            Some(PRIVILEGE_MESSAGE)
        }
        _ => None,
    }
}

/// First error of type `T` in `err`'s source chain, `err` included.
pub fn find_in_chain<'a, T>(err: &'a (dyn StdError + 'static)) -> Option<&'a T>
where
    T: StdError + 'static,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}

fn reinterpretable(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(dep) = e.downcast_ref::<DependencyError>() {
            return dep.public_message();
        }
        #[cfg(feature = "sqlx")]
        if let Some(db) = e.downcast_ref::<sqlx::Error>() {
            return sqlx_public_message(db);
        }
        current = e.source();
    }
    None
}

/// Rewrite allow-listed dependency failures into a public-safe 400.
///
/// Anything else is handed back untouched.
pub fn reinterpret(err: BoxError) -> Result<ApiError, BoxError> {
    match reinterpretable(&*err) {
        Some(message) => Ok(ApiError::bad_request(message).with_internal_cause(err)),
        None => Err(err),
    }
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    find_in_chain::<ContextError>(err).is_some()
        || find_in_chain::<tokio::time::error::Elapsed>(err).is_some()
}

/// Classify a failed request. Logs through the current dispatcher.
pub fn classify(err: BoxError) -> ApiError {
    if let Some(api_err) = find_in_chain::<ApiError>(&*err) {
        let api_err = api_err.clone();
        log_api_error(&api_err);
        return api_err;
    }

    let err = match reinterpret(err) {
        Ok(api_err) => {
            log_api_error(&api_err);
            return api_err;
        }
        Err(err) => err,
    };

    if is_timeout(&*err) {
        tracing::error!(error = %err, "request timeout");
        return ApiError::service_unavailable(TIMEOUT_MESSAGE).with_internal_cause(err);
    }

    tracing::error!(error = %err, "error running API route");
    ApiError::internal(INTERNAL_MESSAGE).with_internal_cause(err)
}

// API errors are an expected outcome, hence info.
fn log_api_error(err: &ApiError) {
    match err.internal_cause() {
        Some(cause) => tracing::info!(
            status = err.status().as_u16(),
            error = %err,
            internal_error = %cause,
            "API error response"
        ),
        None => tracing::info!(
            status = err.status().as_u16(),
            error = %err,
            "API error response"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("error running query: {source}")]
    struct QueryError {
        #[source]
        source: DependencyError,
    }

    fn boxed<E: StdError + Send + Sync + 'static>(err: E) -> BoxError {
        Box::new(err)
    }

    #[test]
    fn connect_failure_is_reinterpreted() {
        let err = DependencyError::connect("postgres", "connection refused");
        let api_err = reinterpret(boxed(err)).unwrap();

        assert_eq!(api_err, ApiError::bad_request(CONNECT_MESSAGE));
        assert_eq!(
            api_err.internal_cause().map(|c| c.to_string()),
            Some("error connecting to postgres: connection refused".to_string())
        );
    }

    #[test]
    fn insufficient_privilege_is_reinterpreted_through_wrapping() {
        let err = QueryError {
            source: DependencyError::rejected("postgres", INSUFFICIENT_PRIVILEGE, "permission denied"),
        };
        let api_err = reinterpret(boxed(err)).unwrap();

        assert_eq!(api_err, ApiError::bad_request(PRIVILEGE_MESSAGE));
        assert!(api_err.internal_cause().is_some());
    }

    #[test]
    fn other_sqlstate_falls_through() {
        let err = DependencyError::rejected("postgres", "21000", "cardinality violation");
        let original = reinterpret(boxed(err)).unwrap_err();

        assert_eq!(
            original.to_string(),
            "postgres rejected the operation (SQLSTATE 21000): cardinality violation"
        );
        assert_eq!(classify(original).kind(), ErrorKind::InternalServerError);
    }

    #[test]
    fn unrelated_error_falls_through() {
        let original = reinterpret("other error".into()).unwrap_err();
        assert_eq!(original.to_string(), "other error");
    }

    #[test]
    fn api_error_wins() {
        let err = classify(boxed(ApiError::not_found("Job not found.")));
        assert_eq!(err, ApiError::not_found("Job not found."));
    }

    #[test]
    fn context_error_is_a_timeout() {
        let err = classify(boxed(ContextError::DeadlineExceeded));
        assert_eq!(err, ApiError::service_unavailable(TIMEOUT_MESSAGE));
    }

    #[tokio::test]
    async fn elapsed_is_a_timeout() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        let err = classify(boxed(elapsed));
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn anything_else_is_internal_without_leaking() {
        let err = classify("an internal error occurred".into());
        assert_eq!(err, ApiError::internal(INTERNAL_MESSAGE));
        assert!(!err.message().contains("an internal error occurred"));
    }
}
