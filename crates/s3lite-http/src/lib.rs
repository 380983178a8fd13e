//! HTTP surface of the s3lite gateway.
//!
//! - **Routing** ([`router`]): maps method, path, query parameters and the
//!   `Host` header to an [`S3Operation`]. Path-style and virtual-hosted-style
//!   bucket addressing are both supported.
//!
//! - **XML** ([`xml`]): S3 response documents and the two request documents
//!   the gateway accepts (multipart completion manifests and versioning
//!   configuration).
//!
//! - **Responses** ([`response`]): status codes, object headers and the S3
//!   `<Error>` document.
//!
//! - **Dispatch** ([`dispatch`]) and **handler** ([`handler`]): the
//!   [`S3Handler`] seam, and [`GatewayHandler`], which authorizes each request
//!   (bucket policy or presigned grant) and runs it against an
//!   [`ObjectGateway`](s3lite_core::ObjectGateway).
//!
//! - **Service** ([`service`]): [`S3HttpService`], the hyper `Service`.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> S3HttpService (hyper Service, request timeout)
//!     -> Health check interception
//!     -> S3Router (virtual hosting + operation identification)
//!     -> Content-Length check, body collection
//!     -> dispatch_operation (S3Handler trait)
//!       -> GatewayHandler: presign verify | policy check -> ObjectGateway
//!     -> Common response headers (x-amz-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use s3lite_auth::PresignSigner;
//! use s3lite_core::{GatewayConfig, ObjectGateway};
//! use s3lite_http::{GatewayHandler, S3HttpConfig, S3HttpService};
//!
//! let config = GatewayConfig::default();
//! let signer = PresignSigner::new("secret", config.presign_clock_skew_secs);
//! let http_config = S3HttpConfig::from(&config);
//! let handler = GatewayHandler::new(ObjectGateway::new(config), signer);
//! let service = S3HttpService::new(handler, http_config);
//! // Serve `service` with hyper-util.
//! ```

pub mod body;
pub mod dispatch;
pub mod handler;
pub mod operation;
pub mod response;
pub mod router;
pub mod service;
pub mod xml;

pub use body::S3ResponseBody;
pub use dispatch::S3Handler;
pub use handler::GatewayHandler;
pub use operation::S3Operation;
pub use router::{RoutingContext, S3Router};
pub use service::{S3HttpConfig, S3HttpService};
