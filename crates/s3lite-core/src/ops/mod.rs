//! Gateway operations.
//!
//! Each submodule adds methods to [`crate::provider::ObjectGateway`]:
//!
//! - `bucket` -- create, head, delete, list buckets
//! - `object` -- put, get, head, exists, delete objects
//! - `multipart` -- initiate, upload part, complete, abort, list, reap
//! - `list` -- paginated object listing
//! - `config` -- bucket policy and versioning
//!
//! Authorization is the caller's job: these methods assume the request has
//! already passed [`crate::provider::ObjectGateway::require`].

pub mod bucket;
pub mod config;
pub mod list;
pub mod multipart;
pub mod object;
