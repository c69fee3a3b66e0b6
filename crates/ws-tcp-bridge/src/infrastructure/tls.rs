//! Optional TLS termination for the WebSocket listener (`wss://`).
//!
//! The bridge core is agnostic to transport security: the relay loop is
//! generic over the raw stream, so a TLS session and a plain session go
//! through identical code.  This module only turns the PEM files named in
//! the configuration into a [`TlsAcceptor`], once, at startup.  Unreadable
//! or invalid material is fatal — the process must not come up half-secured.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::domain::config::TlsFiles;

/// Builds a [`TlsAcceptor`] from PEM-encoded certificate and key files.
///
/// # Errors
///
/// Returns an error when either file cannot be read, the certificate file
/// contains no certificates, the key file contains no private key, or the
/// pair is rejected by rustls (e.g., key does not match the certificate).
pub fn load_acceptor(files: &TlsFiles) -> anyhow::Result<TlsAcceptor> {
    let certs = load_certs(files)?;
    let key = load_key(files)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("TLS certificate/key pair rejected")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(files: &TlsFiles) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(&files.cert)
        .with_context(|| format!("failed to open certificate file {}", files.cert.display()))?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .with_context(|| format!("failed to parse certificate file {}", files.cert.display()))?;

    if certs.is_empty() {
        bail!("no certificates found in {}", files.cert.display());
    }
    Ok(certs)
}

fn load_key(files: &TlsFiles) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(&files.key)
        .with_context(|| format!("failed to open key file {}", files.key.display()))?;

    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("failed to parse key file {}", files.key.display()))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", files.key.display()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cert_file_is_fatal() {
        let files = TlsFiles {
            cert: "/nonexistent/cert.pem".into(),
            key: "/nonexistent/key.pem".into(),
        };
        let err = load_acceptor(&files).err().unwrap();
        assert!(err.to_string().contains("certificate file"));
    }

    #[test]
    fn test_cert_file_without_certificates_is_fatal() {
        // A readable PEM file with no CERTIFICATE blocks must be rejected,
        // not silently accepted as an empty chain.
        let dir = std::env::temp_dir();
        let cert_path = dir.join(format!("ws-tcp-bridge-empty-{}.pem", std::process::id()));
        std::fs::write(&cert_path, "not a certificate\n").unwrap();

        let files = TlsFiles {
            cert: cert_path.clone(),
            key: cert_path.clone(),
        };
        let result = load_acceptor(&files);
        std::fs::remove_file(&cert_path).ok();

        assert!(result.is_err());
    }
}
