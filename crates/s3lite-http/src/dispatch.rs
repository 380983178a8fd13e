//! The boundary between the HTTP service and the operation handler.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use s3lite_core::error::S3ServiceError;
use s3lite_core::provider::ConnectionStatus;

use crate::body::S3ResponseBody;
use crate::operation::S3Operation;
use crate::router::RoutingContext;

/// Boxed future returned by [`S3Handler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3ServiceError>> + Send>>;

/// Implemented by whatever executes routed operations.
///
/// The service owns routing, body collection, timeouts and error rendering;
/// the handler receives the identified operation with the raw request parts
/// and body, and returns a complete response.
pub trait S3Handler: Send + Sync + 'static {
    /// Execute `op`.
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> HandlerFuture;

    /// Counts reported by the health endpoint.
    fn check_connection(&self) -> ConnectionStatus;
}

/// Hand a routed request to `handler`.
pub async fn dispatch_operation<H: S3Handler>(
    handler: &H,
    parts: http::request::Parts,
    body: Bytes,
    ctx: RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    let op = ctx.operation;
    tracing::debug!(operation = %op, bucket = ?ctx.bucket, key = ?ctx.key, "dispatching operation");
    handler.handle_operation(op, parts, body, ctx).await
}
