//! An in-memory [`Transport`] fake for exercising [`crate::Client`] without a
//! real socket — no hyper, no TLS, no event loop. Responses are programmed
//! in before the call that will consume them and delivered as soon as
//! `send` succeeds, so tests never race the client's receiver task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use grpcmux_core::TransportError;
use http::HeaderMap;

use super::{InboundFrame, OutboundRequest, StreamId, Transport, TransportStats};

struct ProgrammedResponse {
    payload: Bytes,
    is_final: bool,
}

pub struct FakeTransport {
    next_stream_id: AtomicI32,
    connected: Mutex<bool>,
    ever_connected: Mutex<bool>,
    reconnects: AtomicU64,
    fail_next_send: Mutex<VecDeque<i32>>,
    responses: Mutex<VecDeque<ProgrammedResponse>>,
    pending: Mutex<VecDeque<InboundFrame>>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            next_stream_id: AtomicI32::new(1),
            connected: Mutex::new(false),
            ever_connected: Mutex::new(false),
            reconnects: AtomicU64::new(0),
            fail_next_send: Mutex::new(VecDeque::new()),
            responses: Mutex::new(VecDeque::new()),
            pending: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// The next successful `send` will deliver this response (split across
    /// more frames if queued multiple times for one stream).
    pub fn queue_response(&self, payload: Bytes, is_final: bool) {
        self.responses.lock().unwrap().push_back(ProgrammedResponse { payload, is_final });
    }

    /// The next `send` call fails with `code` instead of succeeding.
    pub fn fail_next_send(&self, code: i32) {
        self.fail_next_send.lock().unwrap().push_back(code);
    }

    /// The next `count` `send` calls each fail with `code` — for scenarios
    /// where more than one concurrent `send` needs to observe the same
    /// reconnect-eligible error before any of them succeeds.
    pub fn fail_next_sends(&self, code: i32, count: usize) {
        let mut queue = self.fail_next_send.lock().unwrap();
        for _ in 0..count {
            queue.push_back(code);
        }
    }

    pub fn sent_requests(&self) -> Vec<OutboundRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        *self.connected.lock().unwrap() = true;
        let mut ever_connected = self.ever_connected.lock().unwrap();
        if *ever_connected {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
        }
        *ever_connected = true;
        Ok(())
    }

    async fn send(&self, req: OutboundRequest) -> Result<StreamId, TransportError> {
        let stream_id = self.next_stream_id.fetch_add(2, Ordering::Relaxed);

        if let Some(code) = self.fail_next_send.lock().unwrap().pop_front() {
            return Err(TransportError::new(code, "fake:0"));
        }

        self.sent.lock().unwrap().push(req);

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            let mut headers = HeaderMap::new();
            if response.is_final {
                headers.insert("grpc-status", "0".parse().unwrap());
            }
            self.pending.lock().unwrap().push_back(InboundFrame {
                stream_id,
                data: grpcmux_core::encode(&response.payload),
                pipeline: !response.is_final,
                headers,
            });
        }

        Ok(stream_id)
    }

    async fn write(&self, _stream_id: StreamId, _data: Bytes, _end_of_stream: bool) -> Result<(), TransportError> {
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Option<InboundFrame> {
        if let Some(frame) = self.pending.lock().unwrap().pop_front() {
            return Some(frame);
        }
        tokio::time::sleep(timeout).await;
        None
    }

    async fn close(&self) {
        *self.connected.lock().unwrap() = false;
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            streams_opened: 0,
            streams_closed: 0,
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}
