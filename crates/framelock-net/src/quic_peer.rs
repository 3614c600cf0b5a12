//! QUIC substrate for the Peer Session (C6): one reliable, ordered stream
//! per channel (control, bulk) plus unreliable datagrams for input.
//!
//! Authentication beyond the rendezvous token is explicitly out of scope
//! (see the Non-goals), so the TLS layer here exists only to get a QUIC
//! connection up; the server cert is generated fresh per session and the
//! client accepts any cert offered, the same way a LAN P2P demo would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicClientConfig;
use quinn::{ClientConfig, Endpoint, ServerConfig};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use crate::error::NetError;

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
        ]
    }
}

fn generate_self_signed() -> Result<(CertificateDer<'static>, PrivatePkcs8KeyDer<'static>), NetError> {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["peer".to_string()])
            .map_err(|e| NetError::Tls(e.to_string()))?;
    let key = PrivatePkcs8KeyDer::from(signing_key.serialize_der());
    Ok((cert.der().clone(), key))
}

/// Installs the `ring` crypto provider process-wide if nothing else has.
/// Safe to call repeatedly; only the first call wins.
fn ensure_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn server_config() -> Result<ServerConfig, NetError> {
    ensure_crypto_provider();
    let (cert, key) = generate_self_signed()?;
    let mut config = ServerConfig::with_single_cert(vec![cert], key.into())
        .map_err(|e| NetError::Tls(e.to_string()))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(IDLE_TIMEOUT.try_into().unwrap()));
    config.transport_config(Arc::new(transport));
    Ok(config)
}

fn client_config() -> Result<ClientConfig, NetError> {
    ensure_crypto_provider();
    let mut tls = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    tls.alpn_protocols = vec![b"framelock".to_vec()];

    let quic_tls = QuicClientConfig::try_from(tls).map_err(|e| NetError::Tls(e.to_string()))?;
    let mut config = ClientConfig::new(Arc::new(quic_tls));
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(IDLE_TIMEOUT.try_into().unwrap()));
    config.transport_config(Arc::new(transport));
    Ok(config)
}

/// A single bidirectional QUIC connection bound to `peer_addr`, plus the two
/// reliable control/bulk streams opened over it.
pub struct QuicPeer {
    pub endpoint: Endpoint,
    pub connection: quinn::Connection,
    pub control_send: quinn::SendStream,
    pub control_recv: quinn::RecvStream,
    pub bulk_send: quinn::SendStream,
    pub bulk_recv: quinn::RecvStream,
}

impl QuicPeer {
    /// Establish the connection. The host opens the control/bulk streams;
    /// the client accepts them — the role split already present in the
    /// peer-session message table (§4.6), reused here for stream setup too.
    /// Both sides still dial `bind_addr -> peer_addr`, which is what
    /// completes the UDP hole punch set up by rendezvous.
    pub async fn establish(
        is_host: bool,
        bind_addr: SocketAddr,
        peer_addr: SocketAddr,
    ) -> Result<Self, NetError> {
        let mut endpoint = Endpoint::server(server_config()?, bind_addr)?;
        endpoint.set_default_client_config(client_config()?);

        let connecting = endpoint.connect(peer_addr, "peer")?;
        let connection = connecting.await?;
        debug!(%peer_addr, is_host, "quic connection established");

        let (control_send, control_recv, bulk_send, bulk_recv) = if is_host {
            let (cs, cr) = connection.open_bi().await?;
            let (bs, br) = connection.open_bi().await?;
            (cs, cr, bs, br)
        } else {
            let (cs, cr) = connection.accept_bi().await?;
            let (bs, br) = connection.accept_bi().await?;
            (cs, cr, bs, br)
        };

        Ok(Self {
            endpoint,
            connection,
            control_send,
            control_recv,
            bulk_send,
            bulk_recv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_self_signed_produces_a_usable_cert_and_key() {
        let (cert, _key) = generate_self_signed().unwrap();
        assert!(!cert.as_ref().is_empty());
    }

    #[test]
    fn server_config_builds_with_a_fresh_cert() {
        assert!(server_config().is_ok());
    }

    #[test]
    fn client_config_builds_with_the_accept_any_verifier() {
        assert!(client_config().is_ok());
    }
}
