//! Object listing.

use tracing::debug;

use crate::error::S3ServiceError;
use crate::listing::{ListPage, ListRequest};
use crate::provider::ObjectGateway;
use crate::state::ObjectInfo;
use crate::utils::{decode_continuation_token, encode_continuation_token};

impl ObjectGateway {
    /// One page of current objects in key order.
    ///
    /// The page holds at most the requested number of keys. A continuation
    /// token is returned only when more matching keys exist after the last one
    /// in the page.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    /// - [`S3ServiceError::InvalidArgument`] for an undecodable token.
    pub fn list_objects(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<ListPage, S3ServiceError> {
        let target = self.bucket(bucket)?;
        let max_keys = request.effective_max_keys();
        let after = match request.continuation_token.as_deref() {
            Some(token) => Some(decode_continuation_token(token)?),
            None => request.start_after.clone(),
        };
        let prefix = request.prefix.as_deref().unwrap_or("");

        let result = target.list_objects(prefix, after.as_deref(), max_keys);
        let versioned = target.is_versioned();
        let items: Vec<ObjectInfo> = result
            .objects
            .iter()
            .map(|o| ObjectInfo::from_object(o, versioned))
            .collect();
        let next_continuation_token = if result.is_truncated {
            items.last().map(|o| encode_continuation_token(&o.key))
        } else {
            None
        };

        debug!(
            bucket = %bucket,
            prefix = %prefix,
            max_keys,
            key_count = items.len(),
            is_truncated = result.is_truncated,
            "list_objects completed"
        );

        Ok(ListPage {
            key_count: items.len(),
            items,
            is_truncated: next_continuation_token.is_some(),
            next_continuation_token,
            max_keys,
        })
    }
}
