//! TLS configuration for the raw per-connection HTTP/2 transport.
//!
//! Unlike a pooled `hyper-rustls` connector, [`HyperTransport`](super::HyperTransport)
//! owns exactly one [`tokio_rustls::TlsConnector`] built once at construction
//! time and reused across reconnects.

use std::sync::Arc;

use rustls::ClientConfig;

/// Root store assembled from whichever `tls-native-roots` / `tls-webpki-roots`
/// feature is enabled, preferring the native store when both are.
fn default_roots() -> rustls::RootCertStore {
    #[cfg(feature = "tls-native-roots")]
    {
        let mut roots = rustls::RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            let _ = roots.add(cert);
        }
        if !roots.is_empty() {
            return roots;
        }
    }
    #[cfg(feature = "tls-webpki-roots")]
    {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        return roots;
    }
    #[allow(unreachable_code)]
    rustls::RootCertStore::empty()
}

/// A TLS configuration using the platform's (or webpki's) trusted roots and
/// no client certificate.
pub fn default_tls_config() -> ClientConfig {
    ClientConfig::builder()
        .with_root_certificates(default_roots())
        .with_no_client_auth()
}

/// Build a TLS configuration, optionally trusting additional roots and/or
/// presenting a client certificate for mTLS.
pub fn build_tls_config(
    additional_roots: Vec<rustls::pki_types::CertificateDer<'static>>,
    client_auth: Option<(
        Vec<rustls::pki_types::CertificateDer<'static>>,
        rustls::pki_types::PrivateKeyDer<'static>,
    )>,
) -> Result<ClientConfig, rustls::Error> {
    let mut roots = default_roots();
    for cert in additional_roots {
        roots.add(cert)?;
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let config = match client_auth {
        Some((chain, key)) => builder.with_client_auth_cert(chain, key)?,
        None => builder.with_no_client_auth(),
    };
    Ok(config)
}

/// A certificate verifier that accepts any certificate.
///
/// # Warning
///
/// Only for development/testing against a server with a certificate this
/// process doesn't otherwise trust.
#[derive(Debug)]
struct DangerousAcceptAnyCertVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousAcceptAnyCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

/// A TLS configuration that accepts any server certificate.
///
/// # Warning
///
/// Vulnerable to man-in-the-middle attacks; never use against a production
/// endpoint.
pub fn danger_accept_invalid_certs_config() -> ClientConfig {
    ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertVerifier))
        .with_no_client_auth()
}
