//! The production [`Transport`]: one raw HTTP/2 connection per [`HyperTransport`],
//! handshaked directly with `hyper::client::conn::http2` rather than through
//! `hyper_util`'s pooled legacy client — this crate owns connection lifecycle
//! and per-stream fan-out itself, one layer up.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use grpcmux_core::{codes, TransportError, HEADER_LEN};
use http::{HeaderMap, Request, Response};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::client::conn::http2;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_rustls::{client::TlsStream, TlsConnector};

use super::body::RequestBody;
use super::connector::default_tls_config;
use super::{Encoding, Endpoint, InboundFrame, OutboundRequest, StreamId, Transport, TransportStats};
use crate::settings::ClientSettings;

/// A plain or TLS-wrapped `TcpStream`, unified behind one `AsyncRead`/`AsyncWrite`
/// impl so the handshake code doesn't need to be generic over the connection kind.
enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// The live handshake output; swapped out wholesale on reconnect.
struct Session {
    send_request: http2::SendRequest<RequestBody>,
    driver: tokio::task::JoinHandle<()>,
}

/// One HTTP/2 connection, fanning every stream's response frames onto a
/// single shared channel that `recv`/`read` drain.
///
/// Reconnecting tears down `session` and dials again; stream ids keep
/// counting up rather than resetting, so a frame delivered after a reconnect
/// can never be mistaken for one belonging to the prior connection's streams.
pub struct HyperTransport {
    endpoint: Endpoint,
    tls: Option<Arc<ClientConfig>>,
    settings: ClientSettings,
    next_stream_id: AtomicI32,
    session: AsyncMutex<Option<Session>>,
    frame_tx: mpsc::Sender<InboundFrame>,
    frame_rx: AsyncMutex<mpsc::Receiver<InboundFrame>>,
    pushes: AsyncMutex<HashMap<StreamId, mpsc::Sender<Bytes>>>,
    streams_opened: Arc<AtomicU64>,
    streams_closed: Arc<AtomicU64>,
    reconnects: AtomicU64,
}

const FRAME_CHANNEL_CAPACITY: usize = 256;

/// `user-agent` sent on every request, identifying this transport and its version.
const USER_AGENT: &str = concat!("grpc-openswoole/", env!("CARGO_PKG_VERSION"));

impl HyperTransport {
    /// A transport that dials `endpoint` over TLS using the platform's trust
    /// roots (see [`super::default_tls_config`]).
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_tls(endpoint, Some(Arc::new(default_tls_config())), ClientSettings::default())
    }

    /// A transport that dials `endpoint` in cleartext (h2c) — for tests and
    /// local development against a plaintext HTTP/2 server.
    pub fn plaintext(endpoint: Endpoint) -> Self {
        Self::with_tls(endpoint, None, ClientSettings::default())
    }

    pub fn with_tls(endpoint: Endpoint, tls: Option<Arc<ClientConfig>>, settings: ClientSettings) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            endpoint,
            tls,
            settings,
            next_stream_id: AtomicI32::new(1),
            session: AsyncMutex::new(None),
            frame_tx,
            frame_rx: AsyncMutex::new(frame_rx),
            pushes: AsyncMutex::new(HashMap::new()),
            streams_opened: Arc::new(AtomicU64::new(0)),
            streams_closed: Arc::new(AtomicU64::new(0)),
            reconnects: AtomicU64::new(0),
        }
    }

    async fn dial(&self) -> Result<(http2::SendRequest<RequestBody>, tokio::task::JoinHandle<()>), TransportError> {
        tokio::time::timeout(self.settings.connect_timeout, self.dial_inner())
            .await
            .map_err(|_| TransportError::new(codes::CONNECTION_REFUSED, &self.endpoint))?
    }

    async fn dial_inner(&self) -> Result<(http2::SendRequest<RequestBody>, tokio::task::JoinHandle<()>), TransportError> {
        let tcp = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(|_| TransportError::new(codes::CONNECTION_REFUSED, &self.endpoint))?;

        let io = match &self.tls {
            Some(config) => {
                let connector = TlsConnector::from(config.clone());
                let server_name = rustls::pki_types::ServerName::try_from(self.endpoint.host.clone())
                    .map_err(|_| TransportError::new(codes::CONNECTION_REFUSED, &self.endpoint))?;
                let stream = connector
                    .connect(server_name, tcp)
                    .await
                    .map_err(|_| TransportError::new(codes::CONNECTION_REFUSED, &self.endpoint))?;
                MaybeTlsStream::Tls(Box::new(stream))
            }
            None => MaybeTlsStream::Plain(tcp),
        };

        let (send_request, connection) = http2::Builder::new(TokioExecutor::new())
            .max_frame_size(self.settings.http2_max_frame_size)
            .max_concurrent_streams(self.settings.http2_max_concurrent_streams)
            .handshake(TokioIo::new(io))
            .await
            .map_err(|_| TransportError::new(codes::CONNECTION_REFUSED, &self.endpoint))?;

        let driver = tokio::spawn(async move {
            let _ = connection.await;
        });

        Ok((send_request, driver))
    }

    fn spawn_response_reader(&self, stream_id: StreamId, response: Response<Incoming>) {
        let frame_tx = self.frame_tx.clone();
        let streams_closed = self.streams_closed.clone();
        let max_length = self.settings.package_max_length;
        let open_eof_check = self.settings.open_eof_check;
        tokio::spawn(async move {
            let mut body = response.into_body();
            let mut buf = BytesMut::new();
            let mut saw_trailers = false;
            loop {
                match body.frame().await {
                    Some(Ok(frame)) => {
                        if frame.is_data() {
                            if let Ok(data) = frame.into_data() {
                                if buf.len() + data.len() > HEADER_LEN + max_length {
                                    let mut headers = HeaderMap::new();
                                    headers.insert("grpc-status", "8".parse().unwrap()); // RESOURCE_EXHAUSTED
                                    let _ = frame_tx
                                        .send(InboundFrame {
                                            stream_id,
                                            data: Bytes::new(),
                                            pipeline: false,
                                            headers,
                                        })
                                        .await;
                                    streams_closed.fetch_add(1, Ordering::Relaxed);
                                    return;
                                }
                                buf.extend_from_slice(&data);
                                while let Some(envelope) = take_complete_envelope(&mut buf) {
                                    if frame_tx
                                        .send(InboundFrame {
                                            stream_id,
                                            data: envelope,
                                            pipeline: true,
                                            headers: HeaderMap::new(),
                                        })
                                        .await
                                        .is_err()
                                    {
                                        return;
                                    }
                                }
                            }
                        } else if let Ok(trailers) = frame.into_trailers() {
                            saw_trailers = true;
                            let _ = frame_tx
                                .send(InboundFrame {
                                    stream_id,
                                    data: Bytes::new(),
                                    pipeline: false,
                                    headers: trailers,
                                })
                                .await;
                            streams_closed.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                    Some(Err(_)) => {
                        let _ = frame_tx
                            .send(InboundFrame {
                                stream_id,
                                data: Bytes::new(),
                                pipeline: false,
                                headers: HeaderMap::new(),
                            })
                            .await;
                        streams_closed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    None => {
                        // Body ended without a trailers frame. `open_eof_check`
                        // decides whether that's surfaced as an error status
                        // rather than silently treated as a clean end-of-stream.
                        if open_eof_check && !saw_trailers {
                            let mut headers = HeaderMap::new();
                            headers.insert("grpc-status", "2".parse().unwrap()); // UNKNOWN
                            headers.insert("grpc-message", "stream ended without trailers".parse().unwrap());
                            let _ = frame_tx
                                .send(InboundFrame {
                                    stream_id,
                                    data: Bytes::new(),
                                    pipeline: false,
                                    headers,
                                })
                                .await;
                        }
                        streams_closed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
            }
        });
    }
}

/// Pull one complete `[flag][len][payload]` envelope out of `buf` if enough
/// bytes have accumulated, leaving any remainder (start of the next frame,
/// or a still-incomplete one) in place.
fn take_complete_envelope(buf: &mut BytesMut) -> Option<Bytes> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let length = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    let total = HEADER_LEN + length;
    if buf.len() < total {
        return None;
    }
    Some(buf.split_to(total).freeze())
}

impl Transport for HyperTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (send_request, driver) = self.dial().await?;
        let mut guard = self.session.lock().await;
        if let Some(old) = guard.take() {
            old.driver.abort();
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(endpoint = %self.endpoint, "http/2 session replaced");
        }
        *guard = Some(Session { send_request, driver });
        Ok(())
    }

    async fn send(&self, req: OutboundRequest) -> Result<StreamId, TransportError> {
        let stream_id = self.next_stream_id.fetch_add(2, Ordering::Relaxed);

        let mut send_request = {
            let guard = self.session.lock().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| TransportError::new(codes::SESSION_CLOSED, &self.endpoint))?;
            session.send_request.clone()
        };

        let body = if req.end_of_stream {
            RequestBody::full(req.body)
        } else {
            let (body, tx) = RequestBody::streaming_channel(16);
            tx.send(req.body)
                .await
                .map_err(|_| TransportError::new(codes::EPIPE, &self.endpoint))?;
            self.pushes.lock().await.insert(stream_id, tx);
            body
        };

        let http_req = Request::builder()
            .method(http::Method::POST)
            .uri(req.method)
            .header(http::header::USER_AGENT, USER_AGENT)
            .header(http::header::CONTENT_TYPE, req.encoding.content_type())
            .header("te", "trailers")
            .version(http::Version::HTTP_2)
            .body(body)
            .map_err(|_| TransportError::new(codes::EPIPE, &self.endpoint))?;

        let response = send_request
            .send_request(http_req)
            .await
            .map_err(|_| TransportError::new(codes::EPIPE, &self.endpoint))?;

        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        self.spawn_response_reader(stream_id, response);
        Ok(stream_id)
    }

    async fn write(&self, stream_id: StreamId, data: Bytes, end_of_stream: bool) -> Result<(), TransportError> {
        let mut pushes = self.pushes.lock().await;
        let tx = pushes
            .get(&stream_id)
            .ok_or_else(|| TransportError::unknown_stream(&self.endpoint))?;
        tx.send(data)
            .await
            .map_err(|_| TransportError::new(codes::EPIPE, &self.endpoint))?;
        if end_of_stream {
            pushes.remove(&stream_id);
        }
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Option<InboundFrame> {
        let mut rx = self.frame_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    async fn close(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            session.driver.abort();
        }
        self.pushes.lock().await.clear();
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("endpoint", &self.endpoint)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_assembly_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 0, 5]);
        assert!(take_complete_envelope(&mut buf).is_none());
        buf.extend_from_slice(b"world");
        let frame = take_complete_envelope(&mut buf).unwrap();
        assert_eq!(&frame[..], b"\x00\x00\x00\x00\x05world");
        assert!(buf.is_empty());
    }

    #[test]
    fn envelope_assembly_splits_multiple_frames_in_one_chunk() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0, 0, 0, 0, 1, b'a']);
        buf.extend_from_slice(&[0, 0, 0, 0, 1, b'b']);
        let first = take_complete_envelope(&mut buf).unwrap();
        let second = take_complete_envelope(&mut buf).unwrap();
        assert_eq!(&first[..], b"\x00\x00\x00\x00\x01a");
        assert_eq!(&second[..], b"\x00\x00\x00\x00\x01b");
        assert!(buf.is_empty());
    }
}
