// Transport setup: address validation, TLS connector and dialing.
//
// The hub speaks plain `ws://` or TLS `wss://`. A custom rustls config is
// only built when the caller supplies a CA file or disables peer
// verification; otherwise tungstenite's webpki roots are used.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// The socket type every other module works with.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// TLS options for `wss://` addresses. Ignored for `ws://`.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// PEM file with one or more CA certificates to trust.
    pub ca_cert: Option<PathBuf>,
    /// Verify the hub's certificate chain and host name.
    pub verify_peer: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            ca_cert: None,
            verify_peer: true,
        }
    }
}

/// Parse `address` and make sure it is a `ws://` or `wss://` URL.
pub fn validate_address(address: &str) -> Result<Url, Error> {
    let url = Url::parse(address).map_err(|e| Error::InvalidAddress {
        url: address.to_owned(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(Error::InvalidAddress {
                url: address.to_owned(),
                reason: format!("unsupported scheme '{other}', expected ws or wss"),
            });
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidAddress {
            url: address.to_owned(),
            reason: "missing host".into(),
        });
    }

    Ok(url)
}

/// Build the TLS connector for `url`.
///
/// Returns `None` when tungstenite's defaults apply (plain `ws://`, or
/// `wss://` with verification on and no custom CA). The CA file is read
/// synchronously here, before any network I/O happens.
pub fn build_connector(url: &Url, tls: &TlsOptions) -> Result<Option<Connector>, Error> {
    if url.scheme() != "wss" {
        return Ok(None);
    }

    let roots = match &tls.ca_cert {
        Some(path) => Some(load_ca_roots(path)?),
        None => None,
    };

    if tls.verify_peer && roots.is_none() {
        return Ok(None);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("failed to select protocol versions: {e}")))?;

    let config = if tls.verify_peer {
        builder
            .with_root_certificates(roots.unwrap_or_else(RootCertStore::empty))
            .with_no_client_auth()
    } else {
        tracing::warn!(url = %url, "TLS peer verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate::new(&provider)))
            .with_no_client_auth()
    };

    Ok(Some(Connector::Rustls(Arc::new(config))))
}

/// Read a PEM bundle into a root store.
fn load_ca_roots(path: &Path) -> Result<RootCertStore, Error> {
    let pem = std::fs::read(path).map_err(|source| Error::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(&pem) {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert {}: {e}", path.display())))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("unusable CA cert {}: {e}", path.display())))?;
    }

    if roots.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(roots)
}

/// Open the WebSocket, bounded by `timeout`.
pub async fn dial(url: &Url, connector: Option<Connector>, timeout: Duration) -> Result<WsStream, Error> {
    tracing::info!(url = %url, "dialing hub");

    let fut = tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, true, connector);
    let (stream, response) = tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Timeout {
            operation: "connect",
            timeout_ms: millis(timeout),
        })??;

    tracing::debug!(status = %response.status(), "WebSocket upgrade complete");
    Ok(stream)
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ── Verification bypass ──────────────────────────────────────────────

/// Accepts any server certificate while still checking handshake
/// signatures with the provider's algorithms.
#[derive(Debug)]
struct AcceptAnyCertificate {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyCertificate {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
