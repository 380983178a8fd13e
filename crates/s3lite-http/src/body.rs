//! Response body for the gateway service.
//!
//! Objects are fully materialized (from memory or spill files) before a
//! response is built, so a body is at most one chunk.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// A single-chunk response body; empty for `204`, `HEAD` and the like.
#[derive(Debug, Default)]
pub struct S3ResponseBody {
    chunk: Option<Bytes>,
}

impl S3ResponseBody {
    /// Body holding `data`. Zero-length data yields an empty body.
    #[must_use]
    pub fn buffered(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            chunk: (!data.is_empty()).then_some(data),
        }
    }

    /// Empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Body for S3ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        Poll::Ready(self.get_mut().chunk.take().map(|data| Ok(Frame::data(data))))
    }

    fn is_end_stream(&self) -> bool {
        self.chunk.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.chunk.as_ref().map_or(0, |c| c.len() as u64))
    }
}
