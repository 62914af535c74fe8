//! The multiplexed gRPC client.
//!
//! This module provides [`Client`], the single-connection, many-stream
//! client built on top of a [`Transport`]. One receiver task drains frames
//! off the transport and fans them out to per-stream mailboxes; `send` and
//! `push` write directly through the transport and coalesce reconnects when
//! the peer resets the connection mid-call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use grpcmux_core::Trailers;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::settings::ClientSettings;
use crate::transport::{Encoding, Endpoint, InboundFrame, OutboundRequest, StreamId, Transport, TransportStats};

/// How long the receiver task blocks on a single `transport.recv`/`read`
/// call before looping back around to check whether the client was closed.
const RECEIVER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long the task that actually reconnects sleeps before its caller
/// retries the send, giving the new connection a moment to settle.
const RECONNECT_LEADER_DELAY: Duration = Duration::from_millis(100);

/// How long a task that observed a reconnect already in progress sleeps
/// before retrying, instead of dialing a second connection itself.
const RECONNECT_FOLLOWER_DELAY: Duration = Duration::from_millis(10);

/// How long `send` backs off before resubmitting when the transport accepts
/// a request but hasn't assigned it a stream id yet.
const SEND_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Whether this client's calls are UNARY (request and response are each a
/// single message) or STREAMING (the request, the response, or both may
/// span multiple messages on the same logical stream).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Unary,
    Streaming,
}

/// A stream's single-slot mailbox: the receiver task sends, the owning
/// `recv` call takes. Bounded to one in-flight frame, so the receiver task
/// naturally backpressures against a caller that isn't reading yet.
struct StreamHandle {
    tx: mpsc::Sender<InboundFrame>,
    rx: AsyncMutex<mpsc::Receiver<InboundFrame>>,
}

/// A multiplexed client over one [`Transport`]. Cheap to share: every field
/// that needs sharing across the receiver task and caller tasks is already
/// an `Arc`, so a `Client` can live behind an `Arc<Client<T>>` of its own or
/// be moved around (e.g. through a [`crate::ClientPool`]) directly.
///
/// # Example
///
/// ```ignore
/// use grpcmux_client::{Client, Encoding, Endpoint, HyperTransport, Mode};
/// use std::time::Duration;
///
/// let endpoint = Endpoint::new("api.example.com", 443);
/// let client = Client::new(endpoint.clone(), Mode::Unary, Default::default(), HyperTransport::new(endpoint));
/// client.connect().await?;
///
/// let stream_id = client.send("pkg.Service/Method", request_bytes, Encoding::Proto).await?;
/// let (response, trailers) = client.recv(stream_id, Duration::from_secs(5)).await?;
/// ```
pub struct Client<T: Transport> {
    endpoint: Endpoint,
    mode: Mode,
    settings: ClientSettings,
    transport: Arc<T>,
    streams: Arc<AsyncMutex<HashMap<StreamId, Arc<StreamHandle>>>>,
    closed: Arc<AtomicBool>,
    reconnecting: Arc<AtomicBool>,
    receiver_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Client<T> {
    pub fn new(endpoint: Endpoint, mode: Mode, settings: ClientSettings, transport: T) -> Self {
        Self {
            endpoint,
            mode,
            settings,
            transport: Arc::new(transport),
            streams: Arc::new(AsyncMutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(true)),
            reconnecting: Arc::new(AtomicBool::new(false)),
            receiver_task: AsyncMutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The underlying transport, mainly useful for tests that need to drive
    /// a fake transport's test-only API (e.g. queuing a canned response)
    /// after a [`crate::ClientPool`] has already built the `Client` around it.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Establish the underlying connection and, the first time this is
    /// called, start the receiver task. Safe to call again after `close`.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.transport.connect().await?;
        self.closed.store(false, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, mode = ?self.mode, "connected");

        let mut task = self.receiver_task.lock().await;
        if task.as_ref().is_none_or(|h| h.is_finished()) {
            *task = Some(self.spawn_receiver());
        }
        Ok(())
    }

    fn spawn_receiver(&self) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let streams = self.streams.clone();
        let closed = self.closed.clone();
        let mode = self.mode;
        #[cfg(feature = "tracing")]
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            while !closed.load(Ordering::Acquire) {
                let frame = match mode {
                    Mode::Unary => transport.recv(RECEIVER_POLL_INTERVAL).await,
                    Mode::Streaming => transport.read(RECEIVER_POLL_INTERVAL).await,
                };
                let Some(frame) = frame else {
                    continue;
                };

                let stream_id = frame.stream_id;
                let is_final = !frame.pipeline;

                let handle = streams.lock().await.get(&stream_id).cloned();
                let Some(handle) = handle else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(endpoint = %endpoint, stream_id, "frame for unregistered stream, dropping");
                    continue;
                };

                if handle.tx.send(frame).await.is_err() {
                    // Owner dropped its side of the mailbox; stop routing
                    // to it.
                    streams.lock().await.remove(&stream_id);
                    continue;
                }
                if is_final {
                    streams.lock().await.remove(&stream_id);
                }
            }
        })
    }

    /// Reconnect, coalescing concurrent callers onto a single attempt per
    /// burst: the first caller to observe `reconnecting == false` closes and
    /// re-dials the transport, then sleeps ~100ms before its caller retries;
    /// everyone else in the same burst just sleeps ~10ms and retries without
    /// touching the transport at all.
    async fn reconnect(&self) -> Result<(), ClientError> {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %self.endpoint, "reconnecting");
            self.transport.close().await;
            let result = self.transport.connect().await;
            // Hold `reconnecting` through the backoff too, not just the dial:
            // a follower that wakes up during this window must still see a
            // burst in progress, or it would dial a second connection itself.
            tokio::time::sleep(RECONNECT_LEADER_DELAY).await;
            self.reconnecting.store(false, Ordering::Release);
            result.map_err(ClientError::from)
        } else {
            tokio::time::sleep(RECONNECT_FOLLOWER_DELAY).await;
            Ok(())
        }
    }

    async fn register_stream(&self, stream_id: StreamId) {
        let (tx, rx) = mpsc::channel(1);
        let handle = Arc::new(StreamHandle {
            tx,
            rx: AsyncMutex::new(rx),
        });
        self.streams.lock().await.insert(stream_id, handle);
    }

    /// Open a new logical stream with `payload` as its first (and, in
    /// [`Mode::Unary`], only) message. Returns the stream id to pass to
    /// [`Client::push`]/[`Client::recv`].
    ///
    /// On a reconnect-eligible transport error (`EPIPE`, `ECONNREFUSED`, or
    /// the internal session-closed marker) this reconnects and retries, up
    /// to `settings.max_retries` times, coalescing with any other caller
    /// already reconnecting.
    pub async fn send(&self, method: impl Into<String>, payload: Bytes, encoding: Encoding) -> Result<StreamId, ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        let method = method.into();
        let end_of_stream = self.mode == Mode::Unary;
        let framed = grpcmux_core::encode(&payload);

        let mut attempt = 0;
        loop {
            let req = OutboundRequest {
                method: method.clone(),
                body: framed.clone(),
                encoding,
                end_of_stream,
            };

            match self.transport.send(req).await {
                Ok(stream_id) if stream_id > 0 => {
                    self.register_stream(stream_id).await;
                    return Ok(stream_id);
                }
                Ok(_) => {
                    // Transport accepted the request but has no stream id
                    // ready yet; back off briefly and resubmit.
                    tokio::time::sleep(SEND_RETRY_DELAY).await;
                }
                Err(err) if err.is_reconnect_eligible() && self.settings.force_reconnect && attempt < self.settings.max_retries => {
                    attempt += 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(endpoint = %self.endpoint, method, attempt, "reconnect-eligible send error, reconnecting");
                    self.reconnect().await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Write an additional message on a stream opened in [`Mode::Streaming`].
    pub async fn push(&self, stream_id: StreamId, payload: Bytes, end_of_stream: bool) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        self.transport
            .write(stream_id, grpcmux_core::encode(&payload), end_of_stream)
            .await
            .map_err(Into::into)
    }

    /// Wait up to `timeout` (or `settings.receive_timeout`, if set — that
    /// setting always takes precedence over the per-call argument) for the
    /// next message on `stream_id`.
    ///
    /// A timeout is not an error: it comes back as `(Bytes::new(),
    /// Trailers::deadline_exceeded())`, matching what a real deadline
    /// exceeded on the server would have produced.
    pub async fn recv(&self, stream_id: StreamId, timeout: Duration) -> Result<(Bytes, Trailers), ClientError> {
        let handle = self
            .streams
            .lock()
            .await
            .get(&stream_id)
            .cloned()
            .ok_or(ClientError::UnknownStream { stream_id })?;

        let effective_timeout = self.settings.receive_timeout.unwrap_or(timeout);
        let mut rx = handle.rx.lock().await;

        match tokio::time::timeout(effective_timeout, rx.recv()).await {
            Ok(Some(frame)) => {
                let payload = grpcmux_core::decode(&frame.data).unwrap_or_default();
                let trailers = if frame.pipeline {
                    Trailers::default()
                } else {
                    Trailers::from_headers(&frame.headers)
                };
                Ok((payload, trailers))
            }
            Ok(None) => Ok((Bytes::new(), Trailers::default())),
            Err(_) => Ok((Bytes::new(), Trailers::deadline_exceeded())),
        }
    }

    /// Tear down the connection and stop the receiver task. `connect` can
    /// be called again afterward to re-establish a fresh session.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.receiver_task.lock().await.take() {
            handle.abort();
        }
        self.transport.close().await;
        self.streams.lock().await.clear();
        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, "closed");
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::FakeTransport;

    fn settings() -> ClientSettings {
        ClientSettings {
            max_retries: 2,
            force_reconnect: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unary_happy_path_round_trips_one_message() {
        let endpoint = Endpoint::new("test", 1);
        let transport = FakeTransport::new();
        transport.queue_response(Bytes::from("pong"), true);
        let client = Client::new(endpoint, Mode::Unary, settings(), transport);
        client.connect().await.unwrap();

        let stream_id = client
            .send("pkg.Svc/Method", Bytes::from("ping"), Encoding::Proto)
            .await
            .unwrap();
        let (data, trailers) = client.recv(stream_id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data, Bytes::from("pong"));
        assert!(trailers.is_ok());
    }

    #[tokio::test]
    async fn recv_times_out_with_synthesized_deadline_exceeded() {
        let endpoint = Endpoint::new("test", 1);
        let transport = FakeTransport::new();
        let client = Client::new(endpoint, Mode::Unary, settings(), transport);
        client.connect().await.unwrap();

        let stream_id = client
            .send("pkg.Svc/Method", Bytes::from("ping"), Encoding::Proto)
            .await
            .unwrap();
        let (data, trailers) = client
            .recv(stream_id, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(data.is_empty());
        assert_eq!(trailers.status, grpcmux_core::Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn recv_on_unregistered_stream_is_unknown_stream() {
        let endpoint = Endpoint::new("test", 1);
        let transport = FakeTransport::new();
        let client = Client::new(endpoint, Mode::Unary, settings(), transport);
        client.connect().await.unwrap();

        let err = client.recv(999, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownStream { stream_id: 999 }));
    }

    #[tokio::test]
    async fn send_reconnects_once_on_epipe_then_succeeds() {
        let endpoint = Endpoint::new("test", 1);
        let transport = FakeTransport::new();
        transport.fail_next_send(grpcmux_core::codes::EPIPE);
        transport.queue_response(Bytes::from("ok"), true);
        let client = Client::new(endpoint, Mode::Unary, settings(), transport);
        client.connect().await.unwrap();

        let stream_id = client
            .send("pkg.Svc/Method", Bytes::from("ping"), Encoding::Proto)
            .await
            .unwrap();
        let (data, _) = client.recv(stream_id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(data, Bytes::from("ok"));
        assert_eq!(client.stats().reconnects, 1);
    }

    #[tokio::test]
    async fn closed_client_rejects_new_sends() {
        let endpoint = Endpoint::new("test", 1);
        let transport = FakeTransport::new();
        let client = Client::new(endpoint, Mode::Unary, settings(), transport);
        client.connect().await.unwrap();
        client.close().await;

        let err = client
            .send("pkg.Svc/Method", Bytes::from("ping"), Encoding::Proto)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }
}
