//! End-to-end scenarios driving [`Client`] and [`ClientPool`] together
//! against the in-memory [`FakeTransport`], rather than either in isolation.
//! The per-component edge cases already live as unit tests next to their
//! implementations; this file is about what only shows up when the two are
//! wired together the way a real caller would use them.

use std::sync::Arc;
use std::time::Duration;

use grpcmux_client::transport::test_support::FakeTransport;
use grpcmux_client::{
    Client, ClientError, ClientFactory, ClientPool, ClientSettings, Encoding, Endpoint, Mode, PoolSettings,
};

struct FakeFactory {
    mode: Mode,
}

impl ClientFactory<FakeTransport> for FakeFactory {
    async fn make(&self, endpoint: Endpoint, settings: ClientSettings) -> Result<Client<FakeTransport>, ClientError> {
        let client = Client::new(endpoint, self.mode, settings, FakeTransport::new());
        client.connect().await?;
        Ok(client)
    }
}

fn pool(mode: Mode, size: usize) -> ClientPool<FakeTransport, FakeFactory> {
    ClientPool::new(
        Endpoint::new("scenarios", 1),
        FakeFactory { mode },
        ClientSettings::default(),
        PoolSettings {
            size,
            ..Default::default()
        },
    )
}

/// Scenario 1 (unary happy path): acquire a Client from the pool, send a
/// unary call, receive the response, and release — the pool's idle/used
/// bookkeeping should be back to where it started.
#[tokio::test]
async fn unary_round_trip_through_the_pool() {
    let pool = pool(Mode::Unary, 2);
    let client = pool.acquire(Duration::from_millis(50)).await.expect("pool should have capacity");
    assert_eq!(pool.size(), 1);

    // Queue the response before `send` so the fake transport can stitch a
    // correctly stream-id-tagged frame into `send`'s own return path.
    client.transport().queue_response(bytes::Bytes::from("world"), true);

    let stream_id = client
        .send("/svc/Method", bytes::Bytes::from("hello"), Encoding::Proto)
        .await
        .unwrap();
    let (payload, trailers) = client.recv(stream_id, Duration::from_secs(1)).await.unwrap();
    assert_eq!(payload, bytes::Bytes::from("world"));
    assert!(trailers.is_ok());

    pool.release(Some(client)).await;
    assert_eq!(pool.size(), 1, "the connection goes back to idle, not destroyed");
}

/// Scenario 4 (client-streaming): open a STREAMING call, push two more
/// messages (the second ending the request), and confirm the aggregate
/// response arrives once and the stream is torn down afterward.
#[tokio::test]
async fn client_streaming_push_then_single_response() {
    let pool = pool(Mode::Streaming, 1);
    let client = pool.acquire(Duration::from_millis(50)).await.unwrap();

    client.transport().queue_response(bytes::Bytes::from("aggregated"), true);

    let stream_id = client
        .send("/svc/Upload", bytes::Bytes::from("a"), Encoding::Proto)
        .await
        .unwrap();
    client.push(stream_id, bytes::Bytes::from("b"), false).await.unwrap();
    client.push(stream_id, bytes::Bytes::from("c"), true).await.unwrap();

    let (payload, trailers) = client.recv(stream_id, Duration::from_secs(1)).await.unwrap();
    assert_eq!(payload, bytes::Bytes::from("aggregated"));
    assert!(trailers.is_ok());

    // The registry removed the stream once the final frame was delivered;
    // a second `recv` on the same id is now unknown.
    let err = client.recv(stream_id, Duration::from_millis(10)).await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownStream { stream_id: sid } if sid == stream_id));

    pool.release(Some(client)).await;
}

/// Scenario 3 (reconnect coalescing), exercised through a pool-acquired
/// client shared by two concurrent callers: both `send`s hit a
/// reconnect-eligible error on their first attempt, but only one actual
/// transport reconnect happens for the whole burst.
#[tokio::test]
async fn concurrent_sends_coalesce_onto_one_reconnect() {
    let settings = ClientSettings {
        force_reconnect: true,
        max_retries: 2,
        ..Default::default()
    };
    let transport = FakeTransport::new();
    transport.fail_next_sends(111, 2); // ECONNREFUSED-class, once for each concurrent send's first attempt
    transport.queue_response(bytes::Bytes::from("one"), true);
    transport.queue_response(bytes::Bytes::from("two"), true);
    let client = Arc::new(Client::new(Endpoint::new("scenarios", 1), Mode::Unary, settings, transport));
    client.connect().await.unwrap();

    let a = client.clone();
    let b = client.clone();
    let (r1, r2) = tokio::join!(
        a.send("/svc/A", bytes::Bytes::from("x"), Encoding::Proto),
        b.send("/svc/B", bytes::Bytes::from("y"), Encoding::Proto),
    );
    r1.unwrap();
    r2.unwrap();

    assert_eq!(client.stats().reconnects, 1, "one burst, one real reconnect");
}

/// Scenario 6 (drain with in-flight), combined with an actual RPC still
/// outstanding on one of the two checked-out clients: `close` must not
/// return until the caller using that client releases it back.
#[tokio::test]
async fn pool_close_waits_for_an_in_flight_rpc() {
    let pool = Arc::new(pool(Mode::Unary, 2));
    let busy = pool.acquire(Duration::from_millis(50)).await.unwrap();
    let idle_one = pool.acquire(Duration::from_millis(50)).await.unwrap();
    pool.release(Some(idle_one)).await;

    busy.transport().queue_response(bytes::Bytes::from("done"), true);
    let stream_id = busy
        .send("/svc/Slow", bytes::Bytes::from("req"), Encoding::Proto)
        .await
        .unwrap();

    let pool_for_close = pool.clone();
    let closer = tokio::spawn(async move { pool_for_close.close().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!closer.is_finished(), "one client is still checked out mid-RPC");

    let (_, trailers) = busy.recv(stream_id, Duration::from_secs(1)).await.unwrap();
    assert!(trailers.is_ok());
    pool.release(Some(busy)).await;

    closer.await.unwrap();
    assert_eq!(pool.size(), 0);
}
