//! [`S3Handler`] backed by an [`ObjectGateway`].
//!
//! Each request is first authorized, then executed:
//!
//! 1. A request carrying a `signature` query parameter is a presigned request.
//!    Its grant is rebuilt from the request's own method, bucket and key and
//!    verified. `Allow` skips policy evaluation; an expired or forged grant is
//!    rejected.
//! 2. Anything else is evaluated against the bucket policy for the caller
//!    named in the `Authorization` header (anonymous without one).
//!    Multipart initiate, part upload and completion count as `s3:PutObject`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HOST, LOCATION};
use http::request::Parts;
use http::{Method, StatusCode};
use s3lite_auth::presign::{EXPIRES_PARAM, SIGNATURE_PARAM};
use s3lite_auth::{AuthError, PresignSigner, PresignedGrant, VerifyOutcome, access_key_from_headers};
use s3lite_core::ObjectGateway;
use s3lite_core::error::S3ServiceError;
use s3lite_core::listing::ListRequest;
use s3lite_core::policy::Action;
use s3lite_core::provider::ConnectionStatus;
use s3lite_core::state::Principal;
use tracing::{debug, warn};

use crate::body::S3ResponseBody;
use crate::dispatch::{HandlerFuture, S3Handler};
use crate::operation::S3Operation;
use crate::response::{
    DELETE_MARKER_HEADER, VERSION_ID_HEADER, build_response, empty_response, header_value,
    json_response, object_response, xml_response,
};
use crate::router::RoutingContext;
use crate::xml::{
    CompleteMultipartUploadResult, InitiateMultipartUploadResult, ListAllMyBucketsResult,
    ListBucketResult, ListMultipartUploadsResult, ListPartsResult, PresignResult,
    VersioningConfiguration, parse_complete_multipart_upload, parse_versioning_configuration,
};

/// Lifetime of a minted presigned URL when `expires` is not given.
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

type HttpResult = Result<http::Response<S3ResponseBody>, S3ServiceError>;

/// Executes operations against an [`ObjectGateway`], verifying presigned
/// requests with a [`PresignSigner`].
#[derive(Debug, Clone)]
pub struct GatewayHandler {
    gateway: ObjectGateway,
    signer: Arc<PresignSigner>,
}

impl GatewayHandler {
    /// Handler over `gateway`, trusting grants signed by `signer`.
    #[must_use]
    pub fn new(gateway: ObjectGateway, signer: PresignSigner) -> Self {
        Self {
            gateway,
            signer: Arc::new(signer),
        }
    }

    /// The gateway this handler executes against.
    #[must_use]
    pub fn gateway(&self) -> &ObjectGateway {
        &self.gateway
    }

    async fn execute(
        &self,
        op: S3Operation,
        parts: Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> HttpResult {
        let principal = caller_principal(&parts.headers)?;
        self.authorize(op, &parts, &ctx, &principal)?;

        match op {
            S3Operation::ListBuckets => {
                let buckets = self.gateway.list_buckets(&principal);
                xml_response(
                    "ListAllMyBucketsResult",
                    &ListAllMyBucketsResult {
                        owner: &principal,
                        buckets: &buckets,
                    },
                )
            }
            S3Operation::CreateBucket => {
                let bucket = ctx.require_bucket()?;
                self.gateway.create_bucket(bucket, &principal)?;
                build_response(
                    http::Response::builder()
                        .status(StatusCode::OK)
                        .header(LOCATION, header_value(&format!("/{bucket}"))?),
                    S3ResponseBody::empty(),
                )
            }
            S3Operation::HeadBucket => {
                self.gateway.head_bucket(ctx.require_bucket()?)?;
                empty_response(StatusCode::OK)
            }
            S3Operation::DeleteBucket => {
                self.gateway.delete_bucket(ctx.require_bucket()?)?;
                empty_response(StatusCode::NO_CONTENT)
            }
            S3Operation::ListObjectsV2 => self.list_objects(&ctx),
            S3Operation::GetBucketPolicy => {
                let policy = self.gateway.get_bucket_policy(ctx.require_bucket()?)?;
                json_response(policy.to_json()?)
            }
            S3Operation::PutBucketPolicy => {
                let json = std::str::from_utf8(&body).map_err(|e| S3ServiceError::MalformedPolicy {
                    message: e.to_string(),
                })?;
                self.gateway.put_bucket_policy(ctx.require_bucket()?, json)?;
                empty_response(StatusCode::NO_CONTENT)
            }
            S3Operation::DeleteBucketPolicy => {
                self.gateway.delete_bucket_policy(ctx.require_bucket()?)?;
                empty_response(StatusCode::NO_CONTENT)
            }
            S3Operation::GetBucketVersioning => {
                let status = self.gateway.get_bucket_versioning(ctx.require_bucket()?)?;
                xml_response("VersioningConfiguration", &VersioningConfiguration(status))
            }
            S3Operation::PutBucketVersioning => {
                let status = parse_versioning_configuration(&body).map_err(|e| {
                    debug!(error = %e, "malformed versioning configuration");
                    S3ServiceError::MalformedXml
                })?;
                self.gateway
                    .put_bucket_versioning(ctx.require_bucket()?, status)?;
                empty_response(StatusCode::OK)
            }
            S3Operation::ListMultipartUploads => {
                let bucket = ctx.require_bucket()?;
                let uploads = self.gateway.list_multipart_uploads(bucket)?;
                xml_response(
                    "ListMultipartUploadsResult",
                    &ListMultipartUploadsResult {
                        bucket,
                        uploads: &uploads,
                    },
                )
            }
            S3Operation::PutObject => {
                let output = self
                    .gateway
                    .put_object(
                        ctx.require_bucket()?,
                        ctx.require_key()?,
                        body,
                        declared_length(&parts)?,
                        content_type(&parts),
                    )
                    .await?;
                write_response(&output.etag, output.version_id.as_deref())
            }
            S3Operation::GetObject => {
                let object = self
                    .gateway
                    .get_object(ctx.require_bucket()?, ctx.require_key()?, ctx.query("versionId"))
                    .await?;
                object_response(&object.info, Some(object.body))
            }
            S3Operation::HeadObject => {
                let info = self.gateway.head_object(
                    ctx.require_bucket()?,
                    ctx.require_key()?,
                    ctx.query("versionId"),
                )?;
                object_response(&info, None)
            }
            S3Operation::DeleteObject => {
                let outcome = self.gateway.delete_object(
                    ctx.require_bucket()?,
                    ctx.require_key()?,
                    ctx.query("versionId"),
                )?;
                let mut builder = http::Response::builder().status(StatusCode::NO_CONTENT);
                if outcome.delete_marker {
                    builder = builder.header(DELETE_MARKER_HEADER, "true");
                }
                if let Some(version_id) = &outcome.version_id {
                    builder = builder.header(VERSION_ID_HEADER, header_value(version_id)?);
                }
                build_response(builder, S3ResponseBody::empty())
            }
            S3Operation::CreateMultipartUpload => {
                let bucket = ctx.require_bucket()?;
                let key = ctx.require_key()?;
                let upload_id = self.gateway.create_multipart_upload(
                    bucket,
                    key,
                    content_type(&parts),
                    &principal,
                )?;
                xml_response(
                    "InitiateMultipartUploadResult",
                    &InitiateMultipartUploadResult {
                        bucket,
                        key,
                        upload_id: &upload_id,
                    },
                )
            }
            S3Operation::UploadPart => {
                let etag = self
                    .gateway
                    .upload_part(
                        ctx.require_bucket()?,
                        ctx.require_key()?,
                        upload_id(&ctx)?,
                        part_number(&ctx)?,
                        body,
                        declared_length(&parts)?,
                    )
                    .await?;
                write_response(&etag, None)
            }
            S3Operation::CompleteMultipartUpload => {
                let manifest = parse_complete_multipart_upload(&body).map_err(|e| {
                    debug!(error = %e, "malformed completion manifest");
                    S3ServiceError::MalformedXml
                })?;
                let output = self
                    .gateway
                    .complete_multipart_upload(
                        ctx.require_bucket()?,
                        ctx.require_key()?,
                        upload_id(&ctx)?,
                        &manifest,
                    )
                    .await?;
                let location = format!("/{}/{}", output.bucket, output.key);
                let mut response = xml_response(
                    "CompleteMultipartUploadResult",
                    &CompleteMultipartUploadResult {
                        location: &location,
                        bucket: &output.bucket,
                        key: &output.key,
                        etag: &output.etag,
                    },
                )?;
                if let Some(version_id) = &output.version_id {
                    response
                        .headers_mut()
                        .insert(VERSION_ID_HEADER, header_value(version_id)?);
                }
                Ok(response)
            }
            S3Operation::AbortMultipartUpload => {
                self.gateway.abort_multipart_upload(
                    ctx.require_bucket()?,
                    ctx.require_key()?,
                    upload_id(&ctx)?,
                )?;
                empty_response(StatusCode::NO_CONTENT)
            }
            S3Operation::ListParts => {
                let bucket = ctx.require_bucket()?;
                let key = ctx.require_key()?;
                let upload_id = upload_id(&ctx)?;
                let parts = self.gateway.list_parts(bucket, key, upload_id)?;
                xml_response(
                    "ListPartsResult",
                    &ListPartsResult {
                        bucket,
                        key,
                        upload_id,
                        parts: &parts,
                    },
                )
            }
            S3Operation::PresignObject => self.presign_object(&parts, &ctx),
        }
    }

    /// Decide whether the request may run.
    fn authorize(
        &self,
        op: S3Operation,
        parts: &Parts,
        ctx: &RoutingContext,
        principal: &Principal,
    ) -> Result<(), S3ServiceError> {
        if ctx.has_query(SIGNATURE_PARAM) {
            if op == S3Operation::PresignObject {
                return Err(S3ServiceError::AccessDenied);
            }
            return self.verify_presigned(parts, ctx);
        }

        let Some(action) = required_action(op, ctx)? else {
            return Ok(());
        };
        let bucket = ctx.require_bucket()?;
        let key = if action.is_object_action() {
            ctx.key.as_deref()
        } else {
            None
        };
        self.gateway
            .require(bucket, key, principal, action)
            .inspect_err(|e| {
                if matches!(e, S3ServiceError::AccessDenied) {
                    warn!(bucket, key, principal = %principal, action = %action, "request denied by policy");
                }
            })
    }

    fn verify_presigned(&self, parts: &Parts, ctx: &RoutingContext) -> Result<(), S3ServiceError> {
        let bucket = ctx.require_bucket()?;
        let key = ctx.key.as_deref().unwrap_or_default();
        let grant = PresignedGrant::from_request(
            &parts.method,
            bucket,
            key,
            ctx.query(EXPIRES_PARAM),
            ctx.query(SIGNATURE_PARAM),
        )
        .map_err(|e| {
            warn!(bucket, key, error = %e, "unusable presigned request");
            S3ServiceError::SignatureDoesNotMatch
        })?;

        match self.signer.verify(&grant, Utc::now()) {
            VerifyOutcome::Allow => {
                debug!(bucket, key, method = %parts.method, "presigned request accepted");
                Ok(())
            }
            VerifyOutcome::Expired => {
                warn!(bucket, key, expires = grant.expires, "presigned request expired");
                Err(S3ServiceError::RequestExpired)
            }
            VerifyOutcome::InvalidSignature => {
                warn!(bucket, key, "presigned signature mismatch");
                Err(S3ServiceError::SignatureDoesNotMatch)
            }
        }
    }

    fn list_objects(&self, ctx: &RoutingContext) -> HttpResult {
        let bucket = ctx.require_bucket()?;
        let request = list_request(ctx)?;
        let page = self.gateway.list_objects(bucket, &request)?;
        xml_response(
            "ListBucketResult",
            &ListBucketResult {
                bucket,
                prefix: request.prefix.as_deref().unwrap_or_default(),
                continuation_token: request.continuation_token.as_deref(),
                start_after: request.start_after.as_deref(),
                page: &page,
            },
        )
    }

    fn presign_object(&self, parts: &Parts, ctx: &RoutingContext) -> HttpResult {
        let bucket = ctx.require_bucket()?;
        let key = ctx.require_key()?;
        let method = presign_method(ctx)?;
        let expiry_secs = match ctx.query(EXPIRES_PARAM) {
            Some(v) => v.parse::<u64>().map_err(|_| S3ServiceError::InvalidArgument {
                message: format!("expires must be a number of seconds: {v}"),
            })?,
            None => DEFAULT_PRESIGN_EXPIRY_SECS,
        };

        let grant = self
            .signer
            .sign(&method, bucket, key, expiry_secs, Utc::now())
            .map_err(|e| match e {
                AuthError::InvalidExpiry { .. } => S3ServiceError::InvalidArgument {
                    message: e.to_string(),
                },
                other => S3ServiceError::Internal(anyhow::anyhow!(other)),
            })?;
        let expires = grant.expires_at().ok_or_else(|| S3ServiceError::InvalidArgument {
            message: format!("expiry out of range: {}", grant.expires),
        })?;

        let endpoint = self.endpoint(parts);
        let url = if ctx.virtual_hosted {
            grant.virtual_hosted_url(&endpoint)
        } else {
            grant.url(&endpoint)
        };
        xml_response(
            "PresignResult",
            &PresignResult {
                url: &url,
                method: method.as_str(),
                expires,
            },
        )
    }

    /// Base URL clients reached this server on; for a virtual-hosted
    /// request this already names the bucket.
    fn endpoint(&self, parts: &Parts) -> String {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| self.gateway.config().listen_addr.clone(), str::to_owned);
        format!("http://{host}")
    }
}

impl S3Handler for GatewayHandler {
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: Parts,
        body: Bytes,
        ctx: RoutingContext,
    ) -> HandlerFuture {
        let handler = self.clone();
        Box::pin(async move { handler.execute(op, parts, body, ctx).await })
    }

    fn check_connection(&self) -> ConnectionStatus {
        self.gateway.check_connection()
    }
}

/// The policy action a request needs, `None` for requests that are not
/// evaluated against a bucket policy.
fn required_action(op: S3Operation, ctx: &RoutingContext) -> Result<Option<Action>, S3ServiceError> {
    let action = match op {
        S3Operation::ListBuckets | S3Operation::CreateBucket => return Ok(None),
        S3Operation::HeadBucket
        | S3Operation::ListObjectsV2
        | S3Operation::ListMultipartUploads => Action::ListBucket,
        S3Operation::DeleteBucket => Action::DeleteBucket,
        S3Operation::GetBucketPolicy => Action::GetBucketPolicy,
        S3Operation::PutBucketPolicy => Action::PutBucketPolicy,
        S3Operation::DeleteBucketPolicy => Action::DeleteBucketPolicy,
        S3Operation::GetBucketVersioning => Action::GetBucketVersioning,
        S3Operation::PutBucketVersioning => Action::PutBucketVersioning,
        S3Operation::GetObject | S3Operation::HeadObject => Action::GetObject,
        S3Operation::PutObject
        | S3Operation::CreateMultipartUpload
        | S3Operation::UploadPart
        | S3Operation::CompleteMultipartUpload => Action::PutObject,
        S3Operation::DeleteObject => Action::DeleteObject,
        S3Operation::AbortMultipartUpload => Action::AbortMultipartUpload,
        S3Operation::ListParts => Action::ListMultipartUploadParts,
        S3Operation::PresignObject => method_action(&presign_method(ctx)?),
    };
    Ok(Some(action))
}

fn method_action(method: &Method) -> Action {
    match *method {
        Method::PUT => Action::PutObject,
        Method::DELETE => Action::DeleteObject,
        _ => Action::GetObject,
    }
}

/// Method a presigned URL is minted for, from `?method=`, default `GET`.
fn presign_method(ctx: &RoutingContext) -> Result<Method, S3ServiceError> {
    match ctx.query("method").map(str::to_ascii_uppercase).as_deref() {
        None | Some("GET") => Ok(Method::GET),
        Some("HEAD") => Ok(Method::HEAD),
        Some("PUT") => Ok(Method::PUT),
        Some("DELETE") => Ok(Method::DELETE),
        Some(other) => Err(S3ServiceError::InvalidArgument {
            message: format!("cannot presign method {other}"),
        }),
    }
}

fn caller_principal(headers: &http::HeaderMap) -> Result<Principal, S3ServiceError> {
    let access_key = access_key_from_headers(headers).map_err(|e| S3ServiceError::InvalidArgument {
        message: format!("Authorization header is malformed: {e}"),
    })?;
    Ok(Principal::from_access_key(access_key.as_deref()))
}

fn list_request(ctx: &RoutingContext) -> Result<ListRequest, S3ServiceError> {
    let max_keys = ctx
        .query("max-keys")
        .map(|v| {
            v.parse::<usize>().map_err(|_| S3ServiceError::InvalidArgument {
                message: format!("max-keys must be a non-negative integer: {v}"),
            })
        })
        .transpose()?;
    let non_empty = |name| ctx.query(name).filter(|v| !v.is_empty()).map(str::to_owned);
    Ok(ListRequest {
        prefix: non_empty("prefix"),
        continuation_token: non_empty("continuation-token"),
        start_after: non_empty("start-after"),
        max_keys,
    })
}

fn upload_id(ctx: &RoutingContext) -> Result<&str, S3ServiceError> {
    ctx.query("uploadId")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| S3ServiceError::InvalidArgument {
            message: "uploadId is required".to_owned(),
        })
}

fn part_number(ctx: &RoutingContext) -> Result<u32, S3ServiceError> {
    let raw = ctx.query("partNumber").unwrap_or_default();
    raw.parse::<u32>().map_err(|_| S3ServiceError::InvalidArgument {
        message: format!("Part number must be an integer between 1 and 10000: {raw}"),
    })
}

fn declared_length(parts: &Parts) -> Result<Option<u64>, S3ServiceError> {
    parts
        .headers
        .get(CONTENT_LENGTH)
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| S3ServiceError::InvalidArgument {
                    message: "Content-Length is not a valid length".to_owned(),
                })
        })
        .transpose()
}

fn content_type(parts: &Parts) -> Option<&str> {
    parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

fn write_response(etag: &str, version_id: Option<&str>) -> HttpResult {
    let mut builder = http::Response::builder()
        .status(StatusCode::OK)
        .header(ETAG, header_value(etag)?);
    if let Some(version_id) = version_id {
        builder = builder.header(VERSION_ID_HEADER, header_value(version_id)?);
    }
    build_response(builder, S3ResponseBody::empty())
}
