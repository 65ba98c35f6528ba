//! HTTPS transport for signed JSON envelopes

use std::sync::Arc;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::config::{ClientConfig, TrustPolicy};
use crate::error::KsemaError;

pub const AUTH_PATH: &str = "/api/hsm/auth";
pub const REQUEST_PATH: &str = "/api/hsm/request";

/// Sends a JSON body to an appliance endpoint and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>, KsemaError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>, KsemaError> {
        (**self).post(path, body).await
    }
}

/// reqwest client over rustls, restricted to the X25519MLKEM768 hybrid key exchange.
#[derive(Clone)]
pub struct HttpsTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpsTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, KsemaError> {
        let tls = tls_config(config.trust_policy())?;
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>, KsemaError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        // The envelope carries its own status; the body is parsed regardless.
        if !response.status().is_success() {
            tracing::warn!("{} returned HTTP {}", path, response.status());
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Build the rustls client configuration for a trust policy.
pub fn tls_config(trust_policy: &TrustPolicy) -> Result<rustls::ClientConfig, KsemaError> {
    let mut provider = aws_lc_rs::default_provider();
    provider.kx_groups = vec![aws_lc_rs::kx_group::X25519MLKEM768];
    let provider = Arc::new(provider);

    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| KsemaError::Tls(format!("unsupported protocol versions: {}", e)))?;

    let config = match trust_policy {
        TrustPolicy::WebPki => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TrustPolicy::CustomCa(path) => {
            let pem = std::fs::read(path).map_err(|e| {
                KsemaError::Config(format!("failed to read CA bundle {}: {}", path.display(), e))
            })?;
            builder
                .with_root_certificates(parse_roots(&pem)?)
                .with_no_client_auth()
        }
        TrustPolicy::AcceptInvalid => {
            tracing::warn!("Server certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
                .with_no_client_auth()
        }
    };

    Ok(config)
}

fn parse_roots(pem: &[u8]) -> Result<RootCertStore, KsemaError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| KsemaError::Tls(format!("failed to parse CA certificates: {}", e)))?;

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| KsemaError::Tls(format!("failed to add CA certificate: {}", e)))?;
    }

    if roots.is_empty() {
        return Err(KsemaError::Tls("no CA certificates found".to_string()));
    }

    Ok(roots)
}

/// Skips chain validation but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
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
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
