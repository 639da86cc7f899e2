//! SNI-keyed certificate registry for the TLS listener.
//!
//! Each host carries its own certificate/key pair; the registry resolves the
//! right one per-connection from the TLS `ClientHello`'s SNI name, so a
//! single listener can terminate TLS for every configured host.

use std::sync::Arc;

use dashmap::DashMap;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use crate::model::HostConfig;

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("failed to read certificate file {0}: {1}")]
    ReadCert(String, std::io::Error),
    #[error("failed to read key file {0}: {1}")]
    ReadKey(String, std::io::Error),
    #[error("no certificates found in {0}")]
    NoCertificates(String),
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    #[error("invalid key material for host '{0}': {1}")]
    InvalidKey(String, rustls::Error),
}

/// Resolves a TLS certificate per SNI host name.
pub struct CertificateRegistry {
    by_name: DashMap<String, Arc<CertifiedKey>>,
    fallback: DashMap<(), Arc<CertifiedKey>>,
}

impl CertificateRegistry {
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            fallback: DashMap::new(),
        }
    }

    /// Load and register the certificate for one host, keyed by every host
    /// name it answers to. No-op if the host has TLS disabled.
    pub fn load_host(&self, host: &HostConfig) -> Result<(), CertError> {
        if !host.ssl_enabled {
            return Ok(());
        }
        let cert_path = host.cert_pem_path.as_deref().unwrap_or_default();
        let key_path = host.key_pem_path.as_deref().unwrap_or_default();
        let key = load_certified_key(cert_path, key_path)?;
        for name in &host.host_names {
            self.by_name.insert(name.clone(), key.clone());
        }
        Ok(())
    }

    /// Register a certificate used when no SNI name matches any host
    /// (browsers/clients without SNI support, or connections to an IP).
    pub fn set_fallback(&self, cert_path: &str, key_path: &str) -> Result<(), CertError> {
        let key = load_certified_key(cert_path, key_path)?;
        self.fallback.insert((), key);
        Ok(())
    }

    pub fn remove_host(&self, host: &HostConfig) {
        self.remove_host_names(&host.host_names);
    }

    pub fn remove_host_names(&self, host_names: &[String]) {
        for name in host_names {
            self.by_name.remove(name);
        }
    }
}

impl Default for CertificateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CertificateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRegistry")
            .field("hosts", &self.by_name.len())
            .finish()
    }
}

impl ResolvesServerCert for CertificateRegistry {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        if let Some(name) = client_hello.server_name()
            && let Some(key) = self.by_name.get(name)
        {
            return Some(key.value().clone());
        }
        self.fallback.get(&()).map(|e| e.value().clone())
    }
}

fn load_certified_key(cert_path: &str, key_path: &str) -> Result<Arc<CertifiedKey>, CertError> {
    let cert_bytes =
        std::fs::read(cert_path).map_err(|e| CertError::ReadCert(cert_path.to_string(), e))?;
    let key_bytes =
        std::fs::read(key_path).map_err(|e| CertError::ReadKey(key_path.to_string(), e))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_bytes.as_slice())
        .collect::<Result<_, _>>()
        .map_err(|e| CertError::ReadCert(cert_path.to_string(), e))?;
    if certs.is_empty() {
        return Err(CertError::NoCertificates(cert_path.to_string()));
    }

    let key = rustls_pemfile::private_key(&mut key_bytes.as_slice())
        .map_err(|e| CertError::ReadKey(key_path.to_string(), e))?
        .ok_or_else(|| CertError::NoPrivateKey(key_path.to_string()))?;

    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(|e| CertError::InvalidKey(cert_path.to_string(), e))?;

    Ok(Arc::new(CertifiedKey::new(certs, signing_key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_host_with_ssl_disabled_is_noop() {
        let registry = CertificateRegistry::new();
        let host = HostConfig {
            code: "h1".into(),
            host_names: vec!["example.com".into()],
            ..Default::default()
        };
        assert!(registry.load_host(&host).is_ok());
    }

    #[test]
    fn missing_cert_file_errors() {
        let registry = CertificateRegistry::new();
        let host = HostConfig {
            code: "h1".into(),
            host_names: vec!["example.com".into()],
            ssl_enabled: true,
            cert_pem_path: Some("/nonexistent/cert.pem".into()),
            key_pem_path: Some("/nonexistent/key.pem".into()),
            ..Default::default()
        };
        assert!(registry.load_host(&host).is_err());
    }
}
