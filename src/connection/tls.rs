//! TLS configuration and support for encrypted MySQL connections.
//!
//! MySQL upgrades an established TCP connection in place: the client sends the SSL
//! request packet and then starts a TLS handshake on the same socket. How strictly the
//! server certificate is checked depends on [`SslMode`].

use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SSL/TLS connection mode.
///
/// Any mode other than `Disabled` requires the server to advertise `CLIENT_SSL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslMode {
    /// No TLS (plaintext connection)
    #[default]
    Disabled,
    /// TLS required, server certificate is not verified
    Required,
    /// TLS required, certificate chain must lead to a trusted CA
    VerifyCa,
    /// TLS required, trusted chain and matching host name
    VerifyIdentity,
}

impl SslMode {
    /// Whether TLS is negotiated at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether this mode requires certificate verification (CA or full)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyIdentity)
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Required => write!(f, "required"),
            Self::VerifyCa => write!(f, "verify_ca"),
            Self::VerifyIdentity => write!(f, "verify_identity"),
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "disabled" => Ok(Self::Disabled),
            "required" => Ok(Self::Required),
            "verify_ca" => Ok(Self::VerifyCa),
            "verify_identity" => Ok(Self::VerifyIdentity),
            _ => Err(Error::Config(format!(
                "invalid ssl mode '{}': expected disabled, required, verify_ca, or verify_identity",
                s
            ))),
        }
    }
}

/// TLS configuration for encrypted MySQL connections.
///
/// Holds the trusted roots and an optional client certificate. The rustls
/// `ClientConfig` for a connection is derived from it and the connection's [`SslMode`].
///
/// # Examples
///
/// ```ignore
/// use mysql_wire::connection::TlsConfig;
///
/// // Native roots, falling back to the webpki bundle
/// let tls = TlsConfig::builder().build()?;
///
/// // Private CA with a client certificate
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/etc/mysql/ca.pem")
///     .client_cert("/etc/mysql/client-cert.pem", "/etc/mysql/client-key.pem")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    ca_cert_path: Option<PathBuf>,
    client_cert_path: Option<PathBuf>,
    client_key_path: Option<PathBuf>,
    roots: Arc<RootCertStore>,
    client_identity: Option<(Vec<CertificateDer<'static>>, Arc<PrivateKeyDer<'static>>)>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Number of trusted root certificates
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Whether a client certificate is presented
    pub fn has_client_cert(&self) -> bool {
        self.client_identity.is_some()
    }

    /// Build the rustls `ClientConfig` for `mode`.
    pub fn client_config(&self, mode: SslMode) -> Result<Arc<ClientConfig>> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Config(format!("TLS protocol versions: {}", e)))?;

        let builder = match mode {
            SslMode::Disabled => {
                return Err(Error::Config("TLS requested with ssl mode disabled".into()))
            }
            SslMode::Required => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification { provider })),
            SslMode::VerifyCa => {
                let inner = WebPkiServerVerifier::builder_with_provider(self.roots.clone(), provider)
                    .build()
                    .map_err(|e| Error::Config(format!("TLS verifier: {}", e)))?;
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(CaOnlyVerification { inner }))
            }
            SslMode::VerifyIdentity => builder.with_root_certificates(self.roots.clone()),
        };

        let config = match &self.client_identity {
            Some((certs, key)) => builder
                .with_client_auth_cert(certs.clone(), key.clone_key())
                .map_err(|e| Error::Config(format!("TLS client certificate: {}", e)))?,
            None => builder.with_no_client_auth(),
        };
        Ok(Arc::new(config))
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("client_cert_path", &self.client_cert_path)
            .field("client_key_path", &self.client_key_path)
            .field("roots", &self.roots.len())
            .finish()
    }
}

/// Builder for TLS configuration.
#[derive(Debug, Default)]
pub struct TlsConfigBuilder {
    ca_cert_path: Option<PathBuf>,
    client_cert_path: Option<PathBuf>,
    client_key_path: Option<PathBuf>,
}

impl TlsConfigBuilder {
    /// Trust only the CA certificates in this PEM file.
    ///
    /// If not set, native root certificates are used, falling back to the webpki bundle.
    pub fn ca_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Present a client certificate (PEM certificate chain and PEM private key)
    pub fn client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert_path = Some(cert.into());
        self.client_key_path = Some(key.into());
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a PEM file cannot be read or contains no usable items.
    pub fn build(self) -> Result<TlsConfig> {
        let roots = match &self.ca_cert_path {
            Some(path) => load_custom_ca(path)?,
            None => load_default_roots(),
        };

        let client_identity = match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => Some((load_certs(cert)?, Arc::new(load_key(key)?))),
            _ => None,
        };

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            client_cert_path: self.client_cert_path,
            client_key_path: self.client_key_path,
            roots: Arc::new(roots),
            client_identity,
        })
    }
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::Config(format!("failed to read {} '{}': {}", what, path.display(), e)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path, "certificate")?)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("failed to parse '{}': {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "no certificates found in '{}'",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path, "private key")?)
        .map_err(|e| Error::Config(format!("failed to parse '{}': {}", path.display(), e)))?
        .ok_or_else(|| Error::Config(format!("no private key found in '{}'", path.display())))
}

fn load_custom_ca(path: &Path) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    let (added, _ignored) = store.add_parsable_certificates(load_certs(path)?);
    if added == 0 {
        return Err(Error::Config(format!(
            "no valid CA certificates in '{}'",
            path.display()
        )));
    }
    Ok(store)
}

fn load_default_roots() -> RootCertStore {
    let mut store = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    store.add_parsable_certificates(native.certs);
    if store.is_empty() {
        tracing::debug!(
            errors = native.errors.len(),
            "no native root certificates, using webpki roots"
        );
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    store
}

/// `Required` mode: any certificate is accepted, handshake signatures are still checked
#[derive(Debug)]
struct NoCertificateVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// `VerifyCa` mode: full chain verification, host name mismatches tolerated
#[derive(Debug)]
struct CaOnlyVerification {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for CaOnlyVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            // NotValidForName and its context-carrying variant
            Err(rustls::Error::InvalidCertificate(e))
                if format!("{:?}", e).starts_with("NotValidForName") =>
            {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is invalid.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.' || c == ':')
    {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    Ok(hostname.to_string())
}
