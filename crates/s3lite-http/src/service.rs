//! The gateway's hyper service.
//!
//! [`S3HttpService`] runs every request through one pipeline:
//!
//! 1. Health check interception (`GET /health`)
//! 2. Routing via [`S3Router`]
//! 3. `Content-Length` enforcement for object uploads
//! 4. Body collection
//! 5. Dispatch to the [`S3Handler`]
//! 6. Error rendering and common headers (`x-amz-request-id`, `Server`)
//!
//! Steps 1 to 5 are bounded by the configured request timeout.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HeaderValue};
use http::request::Parts;
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use s3lite_core::config::GatewayConfig;
use s3lite_core::error::S3ServiceError;
use s3lite_core::provider::ConnectionStatus;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::S3ResponseBody;
use crate::dispatch::{S3Handler, dispatch_operation};
use crate::response::{error_to_response, json_response};
use crate::router::S3Router;

/// Value of the `Server` header.
pub const SERVER_NAME: &str = "s3lite";

/// Path answered by the health check.
pub const HEALTH_PATH: &str = "/health";

/// HTTP-level settings.
#[derive(Debug, Clone)]
pub struct S3HttpConfig {
    /// Base domain for virtual-hosted requests.
    pub domain: String,
    /// Whether the bucket may come from the `Host` header.
    pub virtual_hosting: bool,
    /// Upper bound on handling one request, body upload included.
    pub request_timeout: Duration,
    /// Largest request body buffered before the request is refused.
    pub max_body_size: u64,
}

impl Default for S3HttpConfig {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for S3HttpConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            virtual_hosting: config.virtual_hosting,
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            max_body_size: config.max_body_size,
        }
    }
}

/// hyper service wrapping an [`S3Handler`].
#[derive(Debug)]
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: S3Router,
    config: Arc<S3HttpConfig>,
}

impl<H: S3Handler> S3HttpService<H> {
    /// Service over `handler`.
    #[must_use]
    pub fn new(handler: H, config: S3HttpConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Service over a shared handler.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: S3HttpConfig) -> Self {
        let router = S3Router::new(&config.domain, config.virtual_hosting);
        Self {
            handler,
            router,
            config: Arc::new(config),
        }
    }

    /// Run already-collected request parts and body through the pipeline.
    pub async fn handle(&self, parts: Parts, body: Bytes) -> http::Response<S3ResponseBody> {
        respond(
            self.handler.as_ref(),
            &self.router,
            &self.config,
            parts,
            collect_body(Full::new(body), self.config.max_body_size),
        )
        .await
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: self.router.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let response = respond(
                service.handler.as_ref(),
                &service.router,
                &service.config,
                parts,
                collect_body(incoming, service.config.max_body_size),
            )
            .await;
            Ok(response)
        })
    }
}

/// Assign a request id, run the pipeline under the timeout and stamp the
/// common headers.
async fn respond<H, B>(
    handler: &H,
    router: &S3Router,
    config: &S3HttpConfig,
    parts: Parts,
    body: B,
) -> http::Response<S3ResponseBody>
where
    H: S3Handler,
    B: Future<Output = Result<Bytes, S3ServiceError>>,
{
    let request_id = Uuid::new_v4().to_string();
    let resource = parts.uri.path().to_owned();

    let pipeline = process_request(handler, router, parts, body, &request_id);
    let response = match tokio::time::timeout(config.request_timeout, pipeline).await {
        Ok(response) => response,
        Err(_) => {
            warn!(request_id, resource, timeout = ?config.request_timeout, "request timed out");
            error_to_response(&S3ServiceError::RequestTimeout, Some(&resource), &request_id)
        }
    };
    add_common_headers(response, &request_id)
}

async fn process_request<H, B>(
    handler: &H,
    router: &S3Router,
    parts: Parts,
    body: B,
    request_id: &str,
) -> http::Response<S3ResponseBody>
where
    H: S3Handler,
    B: Future<Output = Result<Bytes, S3ServiceError>>,
{
    let method = parts.method.clone();
    let uri = parts.uri.clone();
    let resource = uri.path();
    debug!(%method, %uri, request_id, "processing request");

    if method == http::Method::GET && resource == HEALTH_PATH {
        return health_check_response(handler.check_connection(), request_id);
    }

    let ctx = match router.resolve(&parts) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route request");
            return error_to_response(&err, Some(resource), request_id);
        }
    };

    info!(
        operation = %ctx.operation,
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        request_id,
        "routed request"
    );

    if ctx.operation.requires_content_length() && !parts.headers.contains_key(CONTENT_LENGTH) {
        warn!(operation = %ctx.operation, request_id, "upload without Content-Length");
        return error_to_response(&S3ServiceError::MissingContentLength, Some(resource), request_id);
    }

    let body = match body.await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, request_id, "failed to read request body");
            return error_to_response(&err, Some(resource), request_id);
        }
    };

    match dispatch_operation(handler, parts, body, ctx).await {
        Ok(response) => response,
        Err(err) => {
            debug!(error = %err, code = err.code(), request_id, "operation failed");
            error_to_response(&err, Some(resource), request_id)
        }
    }
}

/// Buffer a request body, refusing it once it grows past `max_size` bytes.
async fn collect_body<B>(body: B, max_size: u64) -> Result<Bytes, S3ServiceError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_size).unwrap_or(usize::MAX);
    let collected = Limited::new(body, limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            S3ServiceError::EntityTooLarge { max_size }
        } else {
            S3ServiceError::Internal(anyhow::anyhow!("failed to read request body: {e}"))
        }
    })?;
    Ok(collected.to_bytes())
}

fn health_check_response(
    status: ConnectionStatus,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let body = serde_json::json!({
        "status": "running",
        "service": SERVER_NAME,
        "buckets": status.buckets,
        "openUploads": status.open_uploads,
    });
    json_response(body.to_string())
        .unwrap_or_else(|err| error_to_response(&err, Some(HEALTH_PATH), request_id))
}

fn add_common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv);
    }
    headers.insert(http::header::SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}
