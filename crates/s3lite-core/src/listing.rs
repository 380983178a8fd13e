//! Paginated, restartable key listing.
//!
//! A listing walks a bucket's current objects in lexicographic key order. The
//! continuation token encodes the last key returned, so a listing resumed from
//! a token continues strictly after that key:
//!
//! - keys inserted before the cursor are not revisited
//! - keys inserted after the cursor show up in later pages
//!
//! [`ObjectLister`] exposes the same walk as a lazy iterator that pulls one
//! page at a time.

use std::collections::VecDeque;

use typed_builder::TypedBuilder;

use crate::error::S3ServiceError;
use crate::provider::ObjectGateway;
use crate::state::ObjectInfo;
use crate::utils::encode_continuation_token;

/// Page size used when the caller does not ask for one; also the cap.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// Parameters of one listing call.
///
/// # Examples
///
/// ```
/// use s3lite_core::listing::ListRequest;
///
/// let request = ListRequest::builder().prefix("a/").max_keys(2).build();
/// assert_eq!(request.effective_max_keys(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct ListRequest {
    /// Only keys starting with this prefix.
    #[builder(default, setter(strip_option, into))]
    pub prefix: Option<String>,
    /// Token from a previous page. Takes precedence over `start_after`.
    #[builder(default, setter(strip_option, into))]
    pub continuation_token: Option<String>,
    /// Only keys strictly after this one.
    #[builder(default, setter(strip_option, into))]
    pub start_after: Option<String>,
    /// Page size; defaults to and is capped at [`DEFAULT_MAX_KEYS`].
    #[builder(default, setter(strip_option))]
    pub max_keys: Option<usize>,
}

impl ListRequest {
    /// Page size after applying the default and the cap.
    #[must_use]
    pub fn effective_max_keys(&self) -> usize {
        self.max_keys.map_or(DEFAULT_MAX_KEYS, |m| m.min(DEFAULT_MAX_KEYS))
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects in key order.
    pub items: Vec<ObjectInfo>,
    /// Token for the next page; present only when more keys follow.
    pub next_continuation_token: Option<String>,
    /// Whether more matching keys follow.
    pub is_truncated: bool,
    /// Number of items in this page.
    pub key_count: usize,
    /// Page size that was applied.
    pub max_keys: usize,
}

/// Lazy iterator over every object matching a listing request.
///
/// Pages are fetched on demand through [`ObjectGateway::list_objects`]. An
/// error ends the iteration after it is yielded.
#[derive(Debug)]
pub struct ObjectLister {
    gateway: ObjectGateway,
    bucket: String,
    request: ListRequest,
    buffer: VecDeque<ObjectInfo>,
    last_key: Option<String>,
    exhausted: bool,
}

impl ObjectLister {
    /// Iterate from the start of `request`.
    #[must_use]
    pub fn new(gateway: ObjectGateway, bucket: impl Into<String>, request: ListRequest) -> Self {
        Self {
            gateway,
            bucket: bucket.into(),
            request,
            buffer: VecDeque::new(),
            last_key: None,
            exhausted: false,
        }
    }

    /// Iterate from a continuation token issued by an earlier page or by
    /// [`resume_token`](Self::resume_token).
    #[must_use]
    pub fn resume(
        gateway: ObjectGateway,
        bucket: impl Into<String>,
        prefix: Option<String>,
        token: impl Into<String>,
    ) -> Self {
        let request = ListRequest {
            prefix,
            continuation_token: Some(token.into()),
            ..ListRequest::default()
        };
        Self::new(gateway, bucket, request)
    }

    /// Token that resumes right after the last item yielded.
    #[must_use]
    pub fn resume_token(&self) -> Option<String> {
        self.last_key
            .as_deref()
            .map(encode_continuation_token)
            .or_else(|| self.request.continuation_token.clone())
    }

    fn fetch_page(&mut self) -> Result<(), S3ServiceError> {
        let page = self.gateway.list_objects(&self.bucket, &self.request)?;
        self.buffer.extend(page.items);
        match page.next_continuation_token {
            Some(token) => {
                self.request.continuation_token = Some(token);
                self.request.start_after = None;
            }
            None => self.exhausted = true,
        }
        Ok(())
    }
}

impl Iterator for ObjectLister {
    type Item = Result<ObjectInfo, S3ServiceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let item = self.buffer.pop_front()?;
        self.last_key = Some(item.key.clone());
        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::state::Principal;

    async fn gateway_with(keys: &[&str]) -> ObjectGateway {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .create_bucket("list", &Principal::AccessKey("owner".to_owned()))
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        for key in keys {
            gateway
                .put_object("list", key, Bytes::from_static(b"x"), None, None)
                .await
                .unwrap_or_else(|e| panic!("put failed: {e}"));
        }
        gateway
    }

    fn keys(items: &[ObjectInfo]) -> Vec<&str> {
        items.iter().map(|o| o.key.as_str()).collect()
    }

    #[test]
    fn test_should_default_and_cap_max_keys() {
        assert_eq!(ListRequest::default().effective_max_keys(), 1000);
        let big = ListRequest::builder().max_keys(5000).build();
        assert_eq!(big.effective_max_keys(), 1000);
    }

    #[tokio::test]
    async fn test_should_lazily_iterate_all_pages() {
        let gateway = gateway_with(&["a/1", "a/2", "a/3", "a/4", "a/5", "b/1"]).await;
        let request = ListRequest::builder().prefix("a/").max_keys(2).build();
        let collected: Vec<String> = ObjectLister::new(gateway, "list", request)
            .map(|item| item.unwrap_or_else(|e| panic!("{e}")).key)
            .collect();
        assert_eq!(collected, ["a/1", "a/2", "a/3", "a/4", "a/5"]);
    }

    #[tokio::test]
    async fn test_should_resume_after_last_yielded_item() {
        let gateway = gateway_with(&["k1", "k2", "k3", "k4"]).await;
        let request = ListRequest::builder().max_keys(3).build();
        let mut lister = ObjectLister::new(gateway.clone(), "list", request);
        let first = lister.next().and_then(Result::ok).map(|o| o.key);
        assert_eq!(first.as_deref(), Some("k1"));

        let token = lister
            .resume_token()
            .unwrap_or_else(|| panic!("expected a resume token"));
        let rest: Vec<String> = ObjectLister::resume(gateway, "list", None, token)
            .map(|item| item.unwrap_or_else(|e| panic!("{e}")).key)
            .collect();
        assert_eq!(rest, ["k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_should_end_after_yielding_error() {
        let gateway = gateway_with(&[]).await;
        let mut lister = ObjectLister::new(gateway, "missing", ListRequest::default());
        assert!(matches!(
            lister.next(),
            Some(Err(S3ServiceError::NoSuchBucket { .. }))
        ));
        assert!(lister.next().is_none());
    }

    #[tokio::test]
    async fn test_should_page_prefix_with_token() {
        let gateway = gateway_with(&["a/1", "a/2", "a/3"]).await;
        let first = gateway
            .list_objects("list", &ListRequest::builder().prefix("a/").max_keys(2).build())
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(keys(&first.items), ["a/1", "a/2"]);
        assert!(first.is_truncated);
        let token = first
            .next_continuation_token
            .unwrap_or_else(|| panic!("expected a continuation token"));

        let second = gateway
            .list_objects(
                "list",
                &ListRequest::builder()
                    .prefix("a/")
                    .max_keys(2)
                    .continuation_token(token)
                    .build(),
            )
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(keys(&second.items), ["a/3"]);
        assert!(second.next_continuation_token.is_none());
        assert!(!second.is_truncated);
    }
}
