//! HTTP response body supporting buffered and empty modes, same split as
//! the S3 HTTP layer in the host platform.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Response body used throughout the Solobase HTTP layer.
#[derive(Debug, Default)]
pub enum ResponseBody {
    /// Buffered body: JSON payloads, downloaded object bytes, error bodies.
    Buffered(Full<Bytes>),
    /// Empty body for 204/304 responses and HEAD requests.
    #[default]
    Empty,
}

impl ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Serialize `value` as JSON and wrap it in a buffered body.
    pub fn json(value: &impl serde::Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::from_bytes(Bytes::from(serde_json::to_vec(value)?)))
    }
}

impl http_body::Body for ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full).poll_frame(cx).map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body::Body;

    use super::*;

    #[test]
    fn test_should_report_empty_body_as_end_of_stream() {
        assert!(ResponseBody::empty().is_end_stream());
    }

    #[test]
    fn test_should_size_hint_buffered_body() {
        let body = ResponseBody::from_bytes(Bytes::from("hello"));
        assert_eq!(body.size_hint().exact(), Some(5));
    }

    #[test]
    fn test_should_serialize_json_body() {
        let body = ResponseBody::json(&serde_json::json!({"ok": true})).unwrap();
        assert!(!body.is_end_stream());
    }
}
