//! Request body types for the HTTP/2 transport.
//!
//! [`RequestBody`] is what `send`/`push` hand to hyper: either a single
//! complete frame (UNARY) or a channel-fed stream that `push` keeps writing
//! to until the caller ends it (STREAMING).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use grpcmux_core::TransportError;
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pin_project! {
    #[project = RequestBodyProj]
    pub enum RequestBody {
        /// No body at all (never produced by `send`; kept for completeness).
        Empty,
        /// A single complete chunk — the common UNARY case.
        Full {
            data: Option<Bytes>,
        },
        /// Fed by a channel; `push` sends into the paired [`mpsc::Sender`]
        /// and dropping or closing it ends the request stream.
        Streaming {
            #[pin]
            stream: ReceiverStream<Bytes>,
        },
    }
}

impl RequestBody {
    pub fn empty() -> Self {
        RequestBody::Empty
    }

    pub fn full(data: Bytes) -> Self {
        RequestBody::Full { data: Some(data) }
    }

    /// Create a streaming body and the sender that feeds it. Closing (or
    /// dropping) the sender ends the HTTP/2 request stream.
    pub fn streaming_channel(buffer: usize) -> (Self, mpsc::Sender<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            RequestBody::Streaming {
                stream: ReceiverStream::new(rx),
            },
            tx,
        )
    }
}

impl Body for RequestBody {
    type Data = Bytes;
    type Error = TransportError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            RequestBodyProj::Empty => Poll::Ready(None),
            RequestBodyProj::Full { data } => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
            RequestBodyProj::Streaming { stream } => match stream.poll_next(cx) {
                Poll::Ready(Some(data)) => Poll::Ready(Some(Ok(Frame::data(data)))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Full { data } => data.is_none(),
            RequestBody::Streaming { .. } => false,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            RequestBody::Empty => http_body::SizeHint::with_exact(0),
            RequestBody::Full { data } => {
                http_body::SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            RequestBody::Streaming { .. } => http_body::SizeHint::default(),
        }
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Empty
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "RequestBody::Empty"),
            RequestBody::Full { data } => f
                .debug_struct("RequestBody::Full")
                .field("data_len", &data.as_ref().map(|d| d.len()))
                .finish(),
            RequestBody::Streaming { .. } => write!(f, "RequestBody::Streaming"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn empty_body_ends_immediately() {
        let mut body = RequestBody::empty();
        assert!(body.is_end_stream());
        let collected = Pin::new(&mut body).collect().await.unwrap();
        assert!(collected.to_bytes().is_empty());
    }

    #[tokio::test]
    async fn full_body_yields_one_frame() {
        let data = Bytes::from("hello world");
        let mut body = RequestBody::full(data.clone());
        let collected = Pin::new(&mut body).collect().await.unwrap();
        assert_eq!(collected.to_bytes(), data);
    }

    #[tokio::test]
    async fn streaming_body_yields_pushed_chunks_until_sender_drops() {
        let (mut body, tx) = RequestBody::streaming_channel(4);
        tx.send(Bytes::from("a")).await.unwrap();
        tx.send(Bytes::from("b")).await.unwrap();
        drop(tx);

        let collected = Pin::new(&mut body).collect().await.unwrap();
        assert_eq!(collected.to_bytes(), Bytes::from("ab"));
    }
}
