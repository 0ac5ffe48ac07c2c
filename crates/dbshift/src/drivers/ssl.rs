//! Transport encryption settings.
//!
//! One [`SslMode`] comes out of configuration and each backend maps it onto
//! its own TLS options: rustls for PostgreSQL, `SslOpts` for MySQL and the
//! TDS encryption level for SQL Server. SQLite has no transport.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::warn;

use crate::error::{Result, ShiftError};

/// How strictly the server is authenticated. Names follow libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    /// Encrypt, but accept any server certificate.
    Require,
    /// Check the certificate chain.
    VerifyCa,
    /// Check the certificate chain and the host name.
    VerifyFull,
}

impl SslMode {
    pub fn requires_tls(self) -> bool {
        self != SslMode::Disable
    }

    pub fn verifies_certificate(self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyFull)
    }

    /// rustls connector for tokio-postgres, `None` for a plain connection.
    pub fn postgres_connector(self) -> Result<Option<MakeRustlsConnect>> {
        if !self.requires_tls() {
            return Ok(None);
        }
        Ok(Some(MakeRustlsConnect::new(self.rustls_config()?)))
    }

    /// MySQL TLS options, `None` for a plain connection.
    pub fn mysql_opts(self) -> Option<mysql_async::SslOpts> {
        let opts = mysql_async::SslOpts::default();
        match self {
            SslMode::Disable => None,
            SslMode::Require => Some(opts.with_danger_accept_invalid_certs(true)),
            SslMode::VerifyCa => Some(opts.with_danger_skip_domain_validation(true)),
            SslMode::VerifyFull => Some(opts),
        }
    }

    /// Set the TDS encryption level, trusting any certificate for `require`.
    pub fn apply_to_mssql(self, config: &mut tiberius::Config) {
        use tiberius::EncryptionLevel;

        match self {
            SslMode::Disable => config.encryption(EncryptionLevel::NotSupported),
            SslMode::Require => {
                config.trust_cert();
                config.encryption(EncryptionLevel::Required);
            }
            SslMode::VerifyCa | SslMode::VerifyFull => {
                config.encryption(EncryptionLevel::Required)
            }
        }
    }

    fn rustls_config(self) -> Result<ClientConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ShiftError::Config(format!("TLS setup failed: {}", e)))?;

        if self.verifies_certificate() {
            if self == SslMode::VerifyCa {
                // rustls has no chain-only mode
                warn!("ssl mode 'verify-ca' also verifies the host name for PostgreSQL");
            }
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            return Ok(builder.with_root_certificates(roots).with_no_client_auth());
        }

        warn!("ssl mode 'require' does not authenticate the server certificate");
        let verifier = AnyServerCertificate {
            algorithms: provider.signature_verification_algorithms,
        };
        Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth())
    }
}

impl FromStr for SslMode {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "disable" | "false" => Ok(SslMode::Disable),
            "require" | "true" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(ShiftError::Config(format!(
                "Unknown ssl mode '{}' (expected disable, require, verify-ca or verify-full)",
                other
            ))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SslMode::Disable => "disable",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        })
    }
}

/// Skips chain and name checks for `require`. Handshake signatures are
/// still verified, so the peer must hold the key of the certificate it sent.
#[derive(Debug)]
struct AnyServerCertificate {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AnyServerCertificate {
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
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!("".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!("Require".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!("true".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!("verify_ca".parse::<SslMode>().unwrap(), SslMode::VerifyCa);
        assert_eq!("verify-full".parse::<SslMode>().unwrap(), SslMode::VerifyFull);
        assert!("prefer".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for mode in [SslMode::Disable, SslMode::Require, SslMode::VerifyCa, SslMode::VerifyFull] {
            assert_eq!(mode.to_string().parse::<SslMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_postgres_connector() {
        assert!(SslMode::Disable.postgres_connector().unwrap().is_none());
        assert!(SslMode::Require.postgres_connector().unwrap().is_some());
        assert!(SslMode::VerifyFull.postgres_connector().unwrap().is_some());
    }

    #[test]
    fn test_mysql_opts() {
        assert!(SslMode::Disable.mysql_opts().is_none());
        let require = SslMode::Require.mysql_opts().unwrap();
        assert!(require.accept_invalid_certs());
        let verify_ca = SslMode::VerifyCa.mysql_opts().unwrap();
        assert!(!verify_ca.accept_invalid_certs());
        assert!(verify_ca.skip_domain_validation());
        let full = SslMode::VerifyFull.mysql_opts().unwrap();
        assert!(!full.accept_invalid_certs());
        assert!(!full.skip_domain_validation());
    }
}
