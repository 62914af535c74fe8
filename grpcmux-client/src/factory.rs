//! How a [`crate::ClientPool`] builds the [`Client`]s it lends out.

use crate::client::{Client, Mode};
use crate::error::ClientError;
use crate::settings::ClientSettings;
use crate::transport::{Endpoint, HyperTransport, Transport};

/// Builds and connects a fresh [`Client`] for a pool. Kept separate from
/// [`crate::ClientPool`] itself so the pool stays generic over how
/// connections actually get made — production code plugs in
/// [`HyperClientFactory`]; tests plug in something that wraps a fake
/// transport.
pub trait ClientFactory<T: Transport>: Send + Sync + 'static {
    fn make(&self, endpoint: Endpoint, settings: ClientSettings) -> impl Future<Output = Result<Client<T>, ClientError>> + Send;
}

/// The default factory: one [`HyperTransport`] per [`Client`], TLS
/// configuration and call [`Mode`] fixed at construction time.
pub struct HyperClientFactory {
    mode: Mode,
    tls: Option<std::sync::Arc<rustls::ClientConfig>>,
}

impl HyperClientFactory {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            tls: Some(std::sync::Arc::new(crate::transport::default_tls_config())),
        }
    }

    pub fn plaintext(mode: Mode) -> Self {
        Self { mode, tls: None }
    }

    pub fn with_tls(mode: Mode, tls: std::sync::Arc<rustls::ClientConfig>) -> Self {
        Self { mode, tls: Some(tls) }
    }
}

impl ClientFactory<HyperTransport> for HyperClientFactory {
    async fn make(&self, endpoint: Endpoint, settings: ClientSettings) -> Result<Client<HyperTransport>, ClientError> {
        let transport = HyperTransport::with_tls(endpoint.clone(), self.tls.clone(), settings.clone());
        let client = Client::new(endpoint, self.mode, settings, transport);
        client.connect().await?;
        Ok(client)
    }
}
