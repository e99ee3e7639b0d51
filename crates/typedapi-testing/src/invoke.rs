//! Calling handlers directly, without HTTP.
//!
//! Handlers are plain async functions and can be called as such, but going
//! through [`invoke_handler`] adds the checks the pipeline would make: the
//! request is validated before the handler runs, and the response after.
//! There is no timeout, no raw extraction or raw response, and no error
//! classification.

use serde::de::DeserializeOwned;
use std::future::Future;
use typedapi_core::{ApiError, ApiRequest, BoxError, Context, Endpoint, MountOptions};
use typedapi_validate::{Validate, ValidationError, Validator, WireNames};

/// The handler returned a response that breaks its own validation rules.
///
/// A handler bug rather than a caller mistake, so it is never turned into an
/// [`ApiError`].
#[derive(Debug, thiserror::Error)]
#[error("error validating response API resource: {0}")]
pub struct ResponseValidationError(#[source] pub ValidationError);

/// Validate `req`, run `handler`, validate its response.
///
/// An invalid request yields a 400 [`ApiError`] carrying the first
/// violation's message, naming fields as serde does. Handler errors are
/// returned unchanged.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use typedapi_core::{BoxError, Context};
/// use typedapi_testing::invoke_handler;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct Req {
///     #[validate(required)]
///     req_field: Option<String>,
/// }
///
/// #[derive(Debug, Serialize, Validate)]
/// struct Resp {
///     #[validate(length(min = 1))]
///     resp_field: String,
/// }
///
/// async fn handler(_ctx: Context, _req: Req) -> Result<Resp, BoxError> {
///     Ok(Resp { resp_field: "response value".to_string() })
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let req = Req { req_field: Some("string".to_string()) };
/// let resp = invoke_handler(Context::background(), handler, None, req).await.unwrap();
/// assert_eq!(resp.resp_field, "response value");
/// # }
/// ```
pub async fn invoke_handler<F, Fut, Req, Res>(
    ctx: Context,
    handler: F,
    validator: Option<&Validator>,
    req: Req,
) -> Result<Res, BoxError>
where
    F: FnOnce(Context, Req) -> Fut,
    Fut: Future<Output = Result<Res, BoxError>>,
    Req: DeserializeOwned + Validate,
    Res: Validate,
{
    invoke_named(ctx, handler, validator, &WireNames::of::<Req>(), req).await
}

/// [`invoke_handler`] for an [`Endpoint`], using the validator from `opts`.
pub async fn invoke_endpoint<E>(
    endpoint: &E,
    ctx: Context,
    req: E::Request,
    opts: &MountOptions,
) -> Result<E::Response, BoxError>
where
    E: Endpoint,
{
    invoke_named(
        ctx,
        |ctx, req| endpoint.execute(ctx, req),
        opts.validator.as_deref(),
        &<E::Request as ApiRequest>::wire_names(),
        req,
    )
    .await
}

async fn invoke_named<F, Fut, Req, Res>(
    ctx: Context,
    handler: F,
    validator: Option<&Validator>,
    names: &WireNames,
    req: Req,
) -> Result<Res, BoxError>
where
    F: FnOnce(Context, Req) -> Fut,
    Fut: Future<Output = Result<Res, BoxError>>,
    Req: Validate,
    Res: Validate,
{
    let shared;
    let validator = match validator {
        Some(validator) => validator,
        None => {
            shared = Validator::shared();
            &*shared
        }
    };

    if let Err(err) = validator.validate_named(&req, names) {
        let message = validator.first_violation_message(&err);
        return Err(ApiError::bad_request(message).with_internal_cause(err).into());
    }

    let resp = handler(ctx, req).await?;

    if let Err(err) = validator.validate(&resp) {
        return Err(ResponseValidationError(err).into());
    }

    Ok(resp)
}
