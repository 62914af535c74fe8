//! A bounded, cooperatively-shared pool of [`Client`] connections.
//!
//! Modeled on the idle-channel-plus-atomic-size-counter pattern common to
//! Rust connection pools: idle clients sit in a bounded channel, `size`
//! tracks how many connections exist in total (checked out or idle) so the
//! pool never creates more than `PoolSettings::size`, and `close` drains
//! idle connections while cooperatively waiting for checked-out ones to
//! come back.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::Instant;

use crate::client::Client;
use crate::factory::ClientFactory;
use crate::settings::{ClientSettings, PoolSettings};
use crate::transport::{Endpoint, Transport};

/// How often [`ClientPool::close`] rechecks whether every checked-out
/// connection has come back, while it waits.
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long creation backs off between attempts when `PoolSettings::force_recreate`
/// is set and the previous attempt failed.
const FORCE_RECREATE_RETRY_INTERVAL: Duration = Duration::from_millis(500);

pub struct ClientPool<T: Transport, F: ClientFactory<T>> {
    endpoint: Endpoint,
    factory: F,
    client_settings: ClientSettings,
    settings: PoolSettings,
    size: AtomicU32,
    closed: AtomicBool,
    idle_tx: mpsc::Sender<Client<T>>,
    idle_rx: AsyncMutex<mpsc::Receiver<Client<T>>>,
}

impl<T: Transport, F: ClientFactory<T>> ClientPool<T, F> {
    pub fn new(endpoint: Endpoint, factory: F, client_settings: ClientSettings, settings: PoolSettings) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(settings.size.max(1));
        Self {
            endpoint,
            factory,
            client_settings,
            settings,
            size: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            idle_tx,
            idle_rx: AsyncMutex::new(idle_rx),
        }
    }

    /// Total connections this pool currently accounts for — checked out
    /// plus idle. Never exceeds `PoolSettings::size`.
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Check out a connection, waiting up to `timeout` for one to become
    /// available if the pool is already at capacity. `None` means the wait
    /// timed out or the pool is closed — never a panic or error, since both
    /// are ordinary operating conditions for a pool under load.
    pub async fn acquire(&self, timeout: Duration) -> Option<Client<T>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }

        if let Ok(client) = self.idle_rx.lock().await.try_recv() {
            return Some(client);
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            let size = self.size.load(Ordering::Acquire);
            if size < self.settings.size as u32 {
                if self
                    .size
                    .compare_exchange(size, size + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return match self.create().await {
                        Ok(client) => Some(client),
                        Err(_err) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(endpoint = %self.endpoint, error = %_err, "pool connection creation failed");
                            self.size.fetch_sub(1, Ordering::AcqRel);
                            None
                        }
                    };
                }
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let mut rx = self.idle_rx.lock().await;
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(client)) => return Some(client),
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Return a connection to the pool. Pass `None` when the caller is
    /// giving up the connection outright (e.g. it errored unrecoverably)
    /// rather than handing back a live one — either way the pool's size
    /// accounting is kept correct.
    pub async fn release(&self, client: Option<Client<T>>) {
        let Some(client) = client else {
            self.size.fetch_sub(1, Ordering::AcqRel);
            self.replace().await;
            return;
        };

        if self.closed.load(Ordering::Acquire) || client.is_closed() {
            client.close().await;
            self.size.fetch_sub(1, Ordering::AcqRel);
            return;
        }

        if self.idle_tx.try_send(client).is_err() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Called after a caller gives up a connection as non-viable
    /// (`release(None)`): make one attempt to bring the pool back up to its
    /// reserved capacity, the same way `fill` grows it.
    async fn replace(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let size = self.size.load(Ordering::Acquire);
        if size >= self.settings.size as u32 {
            return;
        }
        if self
            .size
            .compare_exchange(size, size + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match self.create().await {
            Ok(client) if self.idle_tx.try_send(client).is_ok() => {}
            Ok(_) => self.size.fetch_sub(1, Ordering::AcqRel),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(endpoint = %self.endpoint, error = %_err, "pool replacement creation failed");
                self.size.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    /// Eagerly create connections up to `PoolSettings::size` rather than
    /// waiting for the first `acquire` calls to do it lazily.
    pub async fn fill(&self) {
        loop {
            let size = self.size.load(Ordering::Acquire);
            if size >= self.settings.size as u32 {
                return;
            }
            if self
                .size
                .compare_exchange(size, size + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            match self.create().await {
                Ok(client) if self.idle_tx.try_send(client).is_ok() => {}
                _ => {
                    self.size.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            }
        }
    }

    /// Mark the pool closed, then cooperatively wait for every checked-out
    /// connection to come back (there is no way to force a borrower to
    /// release early), closing idle connections as they drain in.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::debug!(endpoint = %self.endpoint, outstanding = self.size(), "draining pool");
        loop {
            if self.size.load(Ordering::Acquire) == 0 {
                return;
            }
            match self.idle_rx.lock().await.try_recv() {
                Ok(client) => {
                    client.close().await;
                    self.size.fetch_sub(1, Ordering::AcqRel);
                }
                Err(_) => tokio::time::sleep(CLOSE_POLL_INTERVAL).await,
            }
        }
    }

    /// Without `force_recreate`, a single attempt. With it, retries a failed
    /// creation every ~500ms until one succeeds — `force_recreate` is a
    /// background-creation retry policy, not a reason to discard an already
    /// idle, perfectly usable Client.
    async fn create(&self) -> Result<Client<T>, crate::error::ClientError> {
        loop {
            let mut settings = self.client_settings.clone();
            settings.force_reconnect = self.settings.force_reconnect;
            settings.receive_timeout = self.settings.receive_timeout;
            match self.factory.make(self.endpoint.clone(), settings).await {
                Ok(client) => return Ok(client),
                Err(err) if self.settings.force_recreate => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(endpoint = %self.endpoint, error = %err, "pool creation failed, retrying");
                    tokio::time::sleep(FORCE_RECREATE_RETRY_INTERVAL).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Mode;
    use crate::transport::test_support::FakeTransport;

    struct FakeFactory;

    impl ClientFactory<FakeTransport> for FakeFactory {
        async fn make(&self, endpoint: Endpoint, settings: ClientSettings) -> Result<Client<FakeTransport>, crate::error::ClientError> {
            let client = Client::new(endpoint, Mode::Unary, settings, FakeTransport::new());
            client.connect().await?;
            Ok(client)
        }
    }

    fn pool(size: usize) -> ClientPool<FakeTransport, FakeFactory> {
        ClientPool::new(
            Endpoint::new("test", 1),
            FakeFactory,
            ClientSettings::default(),
            PoolSettings {
                size,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn acquire_creates_up_to_pool_size_then_waits() {
        let pool = pool(1);
        let first = pool.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.size(), 1);

        let second = pool.acquire(Duration::from_millis(20)).await;
        assert!(second.is_none(), "pool is at capacity, acquire should time out");

        pool.release(Some(first)).await;
        let third = pool.acquire(Duration::from_millis(50)).await;
        assert!(third.is_some(), "released connection should satisfy the waiter");
    }

    #[tokio::test]
    async fn release_with_none_shrinks_reservation() {
        let pool = pool(2);
        let _client = pool.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.size(), 1);
        pool.release(None).await;
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn close_drains_idle_connections_and_waits_for_checked_out() {
        let pool = pool(2);
        let a = pool.acquire(Duration::from_millis(50)).await.unwrap();
        let b = pool.acquire(Duration::from_millis(50)).await.unwrap();
        pool.release(Some(b)).await;

        let pool = std::sync::Arc::new(pool);
        let pool2 = pool.clone();
        let closer = tokio::spawn(async move { pool2.close().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!closer.is_finished(), "close should wait for the checked-out connection");

        pool.release(Some(a)).await;
        closer.await.unwrap();
        assert_eq!(pool.size(), 0);
    }
}
