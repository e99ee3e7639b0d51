//! HTTP server implementation

use crate::error::BoxError;
use crate::request::Body;
use crate::response::Response;
use crate::router::Router;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serve `router` on `addr` until the listener fails.
///
/// ```rust,ignore
/// let mut router = Router::new();
/// mount(&mut router, ListQueues::default(), MountOptions::default());
/// typedapi_core::serve(router, "127.0.0.1:8080").await?;
/// ```
pub async fn serve(router: Router, addr: &str) -> Result<(), BoxError> {
    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(addr = %addr, "typedapi server listening");
    serve_listener(router, listener).await
}

/// Serve `router` on an already bound listener.
pub async fn serve_listener(router: Router, listener: TcpListener) -> Result<(), BoxError> {
    let router = Arc::new(router);

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let router = router.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<Incoming>| {
                let router = router.clone();
                async move { Ok::<_, Infallible>(handle_request(&router, req).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(remote_addr = %remote_addr, error = %err, "connection error");
            }
        });
    }
}

/// Handle a single HTTP request
async fn handle_request(router: &Router, req: hyper::Request<Incoming>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let req = req.map(|body| -> Body { body.map_err(|e| Box::new(e) as BoxError).boxed_unsync() });
    let response = router.call(req).await;

    log_request(&method, &path, response.status(), start);
    response
}

/// Log request completion
fn log_request(method: &Method, path: &str, status: StatusCode, start: std::time::Instant) {
    let elapsed = start.elapsed();

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        );
    }
}
