//! Response types stored and reconstructed by the cache
//!
//! A stored body comes back as a [`BodyStream`]: lazy, single-pass and
//! finite. Dropping it stops any further storage reads.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::Result;
use crate::models::Headers;

// == Body Stream ==
/// Lazy sequence of body byte chunks.
pub struct BodyStream {
    inner: BoxStream<'static, Result<Bytes>>,
    disturbed: bool,
}

impl BodyStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
            disturbed: false,
        }
    }

    /// A stream yielding the given chunks in order.
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(stream::iter(chunks.into_iter().map(Ok)))
    }

    /// True once the stream has been polled.
    pub fn is_disturbed(&self) -> bool {
        self.disturbed
    }

    /// Reads the remaining chunks into one buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.disturbed = true;
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("disturbed", &self.disturbed)
            .finish_non_exhaustive()
    }
}

// == Response Body ==
/// Body of a [`CachedResponse`].
#[derive(Debug, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

impl ResponseBody {
    /// True if a streamed body has already been (partially) read.
    pub fn is_disturbed(&self) -> bool {
        matches!(self, ResponseBody::Stream(s) if s.is_disturbed())
    }

    /// Consumes the body into one buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        match self {
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Full(bytes) => Ok(bytes),
            ResponseBody::Stream(stream) => stream.collect_bytes().await,
        }
    }

    /// Converts the body into a stream regardless of its representation.
    pub fn into_stream(self) -> BodyStream {
        match self {
            ResponseBody::Empty => BodyStream::from_chunks(Vec::new()),
            ResponseBody::Full(bytes) => BodyStream::from_chunks(vec![bytes]),
            ResponseBody::Stream(stream) => stream,
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Full(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        ResponseBody::Full(Bytes::from(bytes))
    }
}

impl From<&'static str> for ResponseBody {
    fn from(text: &'static str) -> Self {
        ResponseBody::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Full(Bytes::from(text))
    }
}

impl From<BodyStream> for ResponseBody {
    fn from(stream: BodyStream) -> Self {
        ResponseBody::Stream(stream)
    }
}

// == Cached Response ==
/// HTTP-shaped response: status, ordered headers, body.
#[derive(Debug)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl CachedResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<ResponseBody>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// A `200 OK` response.
    pub fn ok(body: impl Into<ResponseBody>) -> Self {
        Self::new(200, body)
    }

    /// Adds a header and returns the response.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Consumes the response and returns its full body.
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Consumes the response and returns its body as a stream.
    pub fn into_body_stream(self) -> BodyStream {
        self.body.into_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_body_bytes() {
        let response = CachedResponse::ok("hello").with_header("X-A", "1");
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-a"), Some("1"));
        assert_eq!(response.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_stream_body_collects_in_order() {
        let stream = BodyStream::from_chunks(vec![
            Bytes::from_static(b"ab"),
            Bytes::from_static(b"cd"),
        ]);
        let response = CachedResponse::new(201, stream);
        assert_eq!(response.bytes().await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_stream_is_disturbed_after_poll() {
        let mut stream = BodyStream::from_chunks(vec![Bytes::from_static(b"x")]);
        assert!(!stream.is_disturbed());

        let first = stream.next().await;
        assert!(matches!(first, Some(Ok(_))));
        assert!(stream.is_disturbed());
        assert!(ResponseBody::Stream(stream).is_disturbed());
    }

    #[tokio::test]
    async fn test_empty_body() {
        assert!(!ResponseBody::Empty.is_disturbed());
        assert!(ResponseBody::Empty.bytes().await.unwrap().is_empty());
        let chunks: Vec<_> = ResponseBody::Empty.into_stream().collect().await;
        assert!(chunks.is_empty());
    }
}
