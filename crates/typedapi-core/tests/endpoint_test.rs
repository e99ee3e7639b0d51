//! Mounting endpoints on a router and driving requests through the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use typedapi_core::middleware::{BoxedNext, LayerStack, MiddlewareLayer};
use typedapi_core::{
    mount, mount_fn, request, ApiError, ApiRequest, ApiResponse, Body, BoxError, BoxFuture,
    Context, Deadline, DependencyError, Empty, Endpoint, EndpointBase, EndpointMeta, ExtractRaw,
    MountOptions, PipelineConfig, Request, RespondRaw, Response, ResponseWriter, Router,
    INSUFFICIENT_PRIVILEGE, JSON_CONTENT_TYPE,
};
use typedapi_testing::CapturedLogs;
use typedapi_validate::{Nullable, Translator, Validator};
use validator::Validate;

//
// getEndpoint
//

#[derive(Default)]
struct GetEndpoint {
    base: EndpointBase,
}

#[derive(Debug, Default, Deserialize, Validate)]
struct GetRequest {
    #[serde(default, rename = "ignored_json")]
    ignored_json_message: String,
}

impl ApiRequest for GetRequest {}

#[derive(Debug, Serialize, Deserialize, PartialEq, Validate)]
struct GetResponse {
    #[validate(length(min = 1))]
    message: String,
}

impl ApiResponse for GetResponse {}

#[async_trait]
impl Endpoint for GetEndpoint {
    type Request = GetRequest;
    type Response = GetResponse;

    fn meta(&self) -> EndpointMeta {
        EndpointMeta::new("GET /api/get-endpoint", StatusCode::OK)
    }

    fn base(&self) -> &EndpointBase {
        &self.base
    }

    async fn execute(&self, _ctx: Context, req: GetRequest) -> Result<GetResponse, BoxError> {
        // Never taken: GET bodies are not decoded.
        if !req.ignored_json_message.is_empty() {
            return Ok(GetResponse {
                message: req.ignored_json_message,
            });
        }

        Ok(GetResponse {
            message: "Hello.".to_string(),
        })
    }
}

//
// postEndpoint
//

#[derive(Default)]
struct PostEndpoint {
    base: EndpointBase,
}

#[derive(Debug, thiserror::Error)]
#[error("error running Postgres query")]
struct QueryError(#[source] DependencyError);

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
struct PostRequest {
    #[serde(skip)]
    id: String,
    make_api_error: bool,
    make_connect_error: bool,
    make_internal_error: bool,
    make_postgres_error: bool,
    #[validate(required)]
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip)]
    raw_payload: Vec<u8>,
}

impl PostRequest {
    fn with_message(message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Default::default()
        }
    }
}

impl ExtractRaw for PostRequest {
    fn extract_raw(&mut self, req: &Request) -> Result<(), BoxError> {
        self.raw_payload = req.body().map(|b| b.to_vec()).unwrap_or_default();
        self.id = req.path_param("id").unwrap_or_default().to_string();
        Ok(())
    }
}

impl ApiRequest for PostRequest {
    fn raw_extractor(&mut self) -> Option<&mut dyn ExtractRaw> {
        Some(self)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Validate)]
struct PostResponse {
    id: String,
    message: String,
    raw_payload: serde_json::Value,
}

impl ApiResponse for PostResponse {}

#[async_trait]
impl Endpoint for PostEndpoint {
    type Request = PostRequest;
    type Response = PostResponse;

    fn meta(&self) -> EndpointMeta {
        EndpointMeta::new("POST /api/post-endpoint/{id}", StatusCode::CREATED)
    }

    fn base(&self) -> &EndpointBase {
        &self.base
    }

    async fn execute(&self, ctx: Context, req: PostRequest) -> Result<PostResponse, BoxError> {
        ctx.check()?;

        if req.make_api_error {
            return Err(ApiError::bad_request("Bad request.").into());
        }

        if req.make_connect_error {
            return Err(DependencyError::connect("postgres", "connection refused").into());
        }

        if req.make_internal_error {
            return Err("an internal error occurred".into());
        }

        if req.make_postgres_error {
            return Err(QueryError(DependencyError::rejected(
                "postgres",
                INSUFFICIENT_PRIVILEGE,
                "permission denied for table jobs",
            ))
            .into());
        }

        Ok(PostResponse {
            id: req.id,
            message: req.message.unwrap_or_default(),
            raw_payload: serde_json::from_slice(&req.raw_payload)?,
        })
    }
}

//
// Helpers
//

struct Bundle {
    logs: CapturedLogs,
    router: Router,
}

fn setup() -> Bundle {
    let logs = CapturedLogs::new();
    let mut router = Router::new();
    let opts = MountOptions::new().logger(logs.dispatch());

    mount(&mut router, GetEndpoint::default(), opts.clone());
    mount(&mut router, PostEndpoint::default(), opts);

    Bundle { logs, router }
}

fn get(path: &str, body: Body) -> http::Request<Body> {
    http::Request::get(path).body(body).unwrap()
}

fn post<T: Serialize>(path: &str, payload: &T) -> http::Request<Body> {
    http::Request::post(path)
        .body(request::full(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

async fn send(router: &Router, req: http::Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.call(req).await;
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, bytes)
}

#[track_caller]
fn require_status_and_json<T>(
    (status, headers, body): &(StatusCode, HeaderMap, Bytes),
    expected_status: StatusCode,
    expected: &T,
) where
    T: for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug,
{
    assert_eq!(
        *status,
        expected_status,
        "unexpected status code; response body: {}",
        String::from_utf8_lossy(body)
    );
    assert_eq!(&serde_json::from_slice::<T>(body).unwrap(), expected);
    assert_eq!(headers[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Envelope {
    message: String,
}

fn envelope(message: &str) -> Envelope {
    Envelope {
        message: message.to_string(),
    }
}

//
// Tests
//

#[tokio::test]
async fn get_endpoint() {
    let bundle = setup();

    let result = send(&bundle.router, get("/api/get-endpoint", request::empty())).await;

    require_status_and_json(
        &result,
        StatusCode::OK,
        &GetResponse {
            message: "Hello.".to_string(),
        },
    );
}

#[tokio::test]
async fn body_ignored_on_get() {
    let bundle = setup();

    let body = request::full(r#"{"ignored_json":"Ignored hello."}"#);
    let result = send(&bundle.router, get("/api/get-endpoint", body)).await;

    require_status_and_json(
        &result,
        StatusCode::OK,
        &GetResponse {
            message: "Hello.".to_string(),
        },
    );
}

#[tokio::test]
async fn malformed_body_ignored_on_get() {
    let bundle = setup();

    let result = send(&bundle.router, get("/api/get-endpoint", request::full("{not json"))).await;

    assert_eq!(result.0, StatusCode::OK);
}

#[tokio::test]
async fn max_bytes_error_handling() {
    let payload = serde_json::to_vec(&PostRequest::with_message("Hello.")).unwrap();

    let mut router = Router::new();
    mount(
        &mut router,
        PostEndpoint::default(),
        MountOptions::new().config(PipelineConfig::default().with_body_limit(payload.len() - 1)),
    );

    let req = http::Request::post("/api/post-endpoint/123")
        .body(request::full(payload))
        .unwrap();
    let result = send(&router, req).await;

    require_status_and_json(
        &result,
        StatusCode::PAYLOAD_TOO_LARGE,
        &envelope("Request entity too large."),
    );
}

#[tokio::test]
async fn method_not_allowed() {
    let bundle = setup();

    let req = http::Request::post("/api/get-endpoint")
        .body(request::empty())
        .unwrap();
    let (status, headers, body) = send(&bundle.router, req).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[header::ALLOW], "GET");
    assert_eq!(&body[..], b"Method Not Allowed\n");
}

#[tokio::test]
async fn default_options() {
    let mut router = Router::new();
    mount(&mut router, PostEndpoint::default(), MountOptions::default());

    let payload = PostRequest::with_message("Hello.");
    let result = send(&router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(
        &result,
        StatusCode::CREATED,
        &PostResponse {
            id: "123".to_string(),
            message: "Hello.".to_string(),
            raw_payload: serde_json::to_value(&payload).unwrap(),
        },
    );
}

#[tokio::test]
async fn options_with_custom_logger() {
    let logs = CapturedLogs::new();
    let mut router = Router::new();
    let endpoint = mount(
        &mut router,
        PostEndpoint::default(),
        MountOptions::new().logger(logs.dispatch()),
    );

    let mut payload = PostRequest::with_message("Hello.");
    payload.make_api_error = true;
    let result = send(&router, post("/api/post-endpoint/123", &payload)).await;

    assert_eq!(result.0, StatusCode::BAD_REQUEST);
    assert_eq!(
        endpoint.registered_meta().map(|m| m.pattern.as_str()),
        Some("POST /api/post-endpoint/{id}")
    );

    let output = logs.contents();
    assert!(output.contains("INFO"), "logs: {output}");
    assert!(output.contains("API error response"), "logs: {output}");
    assert!(output.contains("POST /api/post-endpoint/{id}"), "logs: {output}");
}

#[tokio::test]
async fn post_endpoint_and_extract_raw() {
    let bundle = setup();

    let payload = PostRequest::with_message("Hello.");
    let result = send(&bundle.router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(
        &result,
        StatusCode::CREATED,
        &PostResponse {
            id: "123".to_string(),
            message: "Hello.".to_string(),
            raw_payload: serde_json::to_value(&payload).unwrap(),
        },
    );
}

#[tokio::test]
async fn validation_error() {
    let bundle = setup();

    let req = http::Request::post("/api/post-endpoint/123")
        .body(request::empty())
        .unwrap();
    let result = send(&bundle.router, req).await;

    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope("Field 'message' is required."),
    );
}

#[tokio::test]
async fn validation_error_uses_serde_field_names() {
    #[derive(Debug, Default, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct CreateQueueRequest {
        #[validate(required)]
        queue_name: Option<String>,
        #[validate(range(min = 1, max = 16))]
        max_workers: Option<u32>,
    }
    impl ApiRequest for CreateQueueRequest {}

    async fn create_queue(_ctx: Context, _req: CreateQueueRequest) -> Result<Empty, BoxError> {
        Ok(Empty {})
    }

    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("POST /api/queues", StatusCode::CREATED),
        create_queue,
        MountOptions::default(),
    );

    let req = http::Request::post("/api/queues")
        .body(request::full("{}"))
        .unwrap();
    let result = send(&router, req).await;
    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope("Field 'queueName' is required."),
    );

    let req = http::Request::post("/api/queues")
        .body(request::full(r#"{"queueName":"jobs","maxWorkers":0}"#))
        .unwrap();
    let result = send(&router, req).await;
    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope("Field 'maxWorkers' must be greater than or equal to 1."),
    );
}

#[tokio::test]
async fn decode_error() {
    let bundle = setup();

    let req = http::Request::post("/api/post-endpoint/123")
        .body(request::full(r#"{"message":"#))
        .unwrap();
    let (status, _, body) = send(&bundle.router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let envelope: Envelope = serde_json::from_slice(&body).unwrap();
    assert!(
        envelope.message.starts_with("Error decoding request body: "),
        "message: {}",
        envelope.message
    );
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let bundle = setup();

    let req = http::Request::post("/api/post-endpoint/123")
        .body(request::full(r#"["Hello."]"#))
        .unwrap();
    let result = send(&bundle.router, req).await;

    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope("Error decoding request body: expected a JSON object."),
    );
}

#[tokio::test]
async fn api_error() {
    let bundle = setup();

    let mut payload = PostRequest::with_message("Hello.");
    payload.make_api_error = true;
    let result = send(&bundle.router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(&result, StatusCode::BAD_REQUEST, &envelope("Bad request."));
}

#[tokio::test]
async fn interpreted_error() {
    let bundle = setup();

    let mut payload = PostRequest::with_message("Hello.");
    payload.make_postgres_error = true;
    let result = send(&bundle.router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope("Insufficient database privilege to perform this operation."),
    );

    let output = bundle.logs.contents();
    assert!(output.contains("internal_error"), "logs: {output}");
    assert!(output.contains("error running Postgres query"), "logs: {output}");
}

#[tokio::test]
async fn interpreted_connect_error() {
    let bundle = setup();

    let mut payload = PostRequest::with_message("Hello.");
    payload.make_connect_error = true;
    let result = send(&bundle.router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(
        &result,
        StatusCode::BAD_REQUEST,
        &envelope(
            "There was a problem connecting to the configured database. Check logs for details.",
        ),
    );
}

#[tokio::test]
async fn timeout() {
    let bundle = setup();

    let mut req = post(
        "/api/post-endpoint/123",
        &PostRequest::with_message("Hello."),
    );
    req.extensions_mut().insert(Deadline(Instant::now()));
    let result = send(&bundle.router, req).await;

    require_status_and_json(
        &result,
        StatusCode::SERVICE_UNAVAILABLE,
        &envelope("Request timed out. Retrying the request might work."),
    );

    let output = bundle.logs.contents();
    assert!(output.contains("ERROR"), "logs: {output}");
    assert!(output.contains("request timeout"), "logs: {output}");
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out() {
    async fn slow(ctx: Context, _req: Empty) -> Result<Empty, BoxError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        ctx.check()?;
        Ok(Empty {})
    }

    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("POST /api/slow", StatusCode::OK),
        slow,
        MountOptions::new()
            .config(PipelineConfig::default().with_request_timeout(Duration::from_millis(50))),
    );

    let req = http::Request::post("/api/slow")
        .body(request::empty())
        .unwrap();
    let result = send(&router, req).await;

    require_status_and_json(
        &result,
        StatusCode::SERVICE_UNAVAILABLE,
        &envelope("Request timed out. Retrying the request might work."),
    );
}

#[tokio::test]
async fn internal_server_error() {
    let bundle = setup();

    let mut payload = PostRequest::with_message("Hello.");
    payload.make_internal_error = true;
    let result = send(&bundle.router, post("/api/post-endpoint/123", &payload)).await;

    require_status_and_json(
        &result,
        StatusCode::INTERNAL_SERVER_ERROR,
        &envelope("Internal server error. Check logs for more information."),
    );

    let output = bundle.logs.contents();
    assert!(output.contains("error running API route"), "logs: {output}");
    assert!(output.contains("an internal error occurred"), "logs: {output}");
}

//
// Raw responses
//

#[derive(Debug, Serialize, Validate)]
struct CsvExport {
    rows: Vec<(u32, String)>,
    #[serde(skip)]
    fail_midway: bool,
}

impl RespondRaw for CsvExport {
    fn respond_raw(&self, w: &mut ResponseWriter) -> Result<(), BoxError> {
        w.set_content_type("text/csv");
        w.write_header(StatusCode::OK);
        writeln!(w, "id,name")?;
        for (id, name) in &self.rows {
            writeln!(w, "{id},{name}")?;
            if self.fail_midway {
                return Err("export interrupted".into());
            }
        }
        Ok(())
    }
}

impl ApiResponse for CsvExport {
    fn raw_responder(&self) -> Option<&dyn RespondRaw> {
        Some(self)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
struct ExportRequest {
    fail_midway: bool,
}

impl ApiRequest for ExportRequest {}

async fn export(_ctx: Context, req: ExportRequest) -> Result<CsvExport, BoxError> {
    Ok(CsvExport {
        rows: vec![(1, "alpha".to_string()), (2, "beta".to_string())],
        fail_midway: req.fail_midway,
    })
}

#[tokio::test]
async fn raw_responder_owns_the_response() {
    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("POST /api/export", StatusCode::CREATED),
        export,
        MountOptions::default(),
    );

    let req = http::Request::post("/api/export")
        .body(request::empty())
        .unwrap();
    let (status, headers, body) = send(&router, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert_eq!(&body[..], b"id,name\n1,alpha\n2,beta\n");
}

#[tokio::test]
async fn raw_responder_error_discards_partial_output() {
    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("POST /api/export", StatusCode::OK),
        export,
        MountOptions::default(),
    );

    let req = http::Request::post("/api/export")
        .body(request::full(r#"{"fail_midway":true}"#))
        .unwrap();
    let result = send(&router, req).await;

    require_status_and_json(
        &result,
        StatusCode::INTERNAL_SERVER_ERROR,
        &envelope("Internal server error. Check logs for more information."),
    );
}

//
// Tri-state fields
//

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
struct UpdateLabelRequest {
    #[validate(length(min = 1, max = 100))]
    label: Nullable<String>,
}

impl ApiRequest for UpdateLabelRequest {}

#[derive(Debug, Serialize, Deserialize, PartialEq, Validate)]
struct UpdateLabelResponse {
    action: String,
}

impl ApiResponse for UpdateLabelResponse {}

async fn update_label(
    _ctx: Context,
    req: UpdateLabelRequest,
) -> Result<UpdateLabelResponse, BoxError> {
    let action = match req.label {
        Nullable::Absent => "unchanged".to_string(),
        Nullable::Null => "cleared".to_string(),
        Nullable::Value(label) => format!("set to {label}"),
    };
    Ok(UpdateLabelResponse { action })
}

#[tokio::test]
async fn nullable_fields_follow_the_payload() {
    let mut router = Router::new();
    mount_fn(
        &mut router,
        EndpointMeta::new("PATCH /api/label", StatusCode::OK),
        update_label,
        MountOptions::default(),
    );

    let cases = [
        (r#"{}"#, StatusCode::OK, r#"{"action":"unchanged"}"#),
        (r#"{"label":null}"#, StatusCode::OK, r#"{"action":"cleared"}"#),
        (r#"{"label":"a"}"#, StatusCode::OK, r#"{"action":"set to a"}"#),
        (
            r#"{"label":""}"#,
            StatusCode::BAD_REQUEST,
            r#"{"message":"Field 'label' must be at least 1 character(s) long."}"#,
        ),
    ];

    for (payload, expected_status, expected_body) in cases {
        let req = http::Request::patch("/api/label")
            .body(request::full(payload))
            .unwrap();
        let (status, _, body) = send(&router, req).await;

        assert_eq!(status, expected_status, "payload: {payload}");
        assert_eq!(String::from_utf8_lossy(&body), expected_body, "payload: {payload}");
    }
}

//
// Options
//

struct Terse;

impl Translator for Terse {
    fn translate(
        &self,
        code: &str,
        field: &str,
        _params: Option<&std::collections::HashMap<String, serde_json::Value>>,
    ) -> Option<String> {
        (code == "required").then(|| format!("{field} missing."))
    }
}

#[tokio::test]
async fn custom_validator() {
    let mut router = Router::new();
    mount(
        &mut router,
        PostEndpoint::default(),
        MountOptions::new().validator(Arc::new(Validator::with_translator(Terse))),
    );

    let req = http::Request::post("/api/post-endpoint/123")
        .body(request::full("{}"))
        .unwrap();
    let result = send(&router, req).await;

    require_status_and_json(&result, StatusCode::BAD_REQUEST, &envelope("message missing."));
}

#[derive(Clone)]
struct PoweredBy;

impl MiddlewareLayer for PoweredBy {
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture<Response> {
        Box::pin(async move {
            let mut response = next(req).await;
            response
                .headers_mut()
                .insert("x-powered-by", http::HeaderValue::from_static("typedapi"));
            response
        })
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

#[tokio::test]
async fn middleware_wraps_the_endpoint() {
    let mut router = Router::new();
    mount(
        &mut router,
        GetEndpoint::default(),
        MountOptions::new().middleware(LayerStack::new().layer(PoweredBy)),
    );

    let (status, headers, _) = send(&router, get("/api/get-endpoint", request::empty())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-powered-by"], "typedapi");
}

#[test]
#[should_panic(expected = "invalid endpoint metadata")]
fn malformed_meta_panics_at_mount() {
    async fn noop(_ctx: Context, _req: Empty) -> Result<Empty, BoxError> {
        Ok(Empty {})
    }

    mount_fn(
        &mut Router::new(),
        EndpointMeta::new("/missing-method", StatusCode::OK),
        noop,
        MountOptions::default(),
    );
}
