//! Port listener supervisor: binds one TCP listener per configured port and
//! serves the engine's `axum::Router` on it, terminating TLS via the SNI
//! certificate registry where the listener asks for it.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use rustls::ServerConfig as RustlsServerConfig;

use crate::certs::CertificateRegistry;
use crate::config::ListenerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS listener on port {0} requires at least one host certificate to be loaded")]
    NoTlsMaterial(u16),
    #[error("invalid TLS server configuration: {0}")]
    InvalidTlsConfig(#[from] rustls::Error),
}

/// Owns the `Handle` used to gracefully shut down every bound listener.
pub struct PortListenerSupervisor {
    handle: Handle,
}

impl PortListenerSupervisor {
    pub fn new() -> Self {
        Self {
            handle: Handle::new(),
        }
    }

    /// Binds and spawns one task per listener. Returns once every listener is
    /// bound (not once they finish serving).
    pub async fn start(
        &self,
        bind_host: IpAddr,
        listeners: &[ListenerConfig],
        build_app: impl Fn(&ListenerConfig) -> Router,
        certs: Arc<CertificateRegistry>,
    ) -> Result<(), ListenerError> {
        for listener_config in listeners {
            let addr = SocketAddr::new(bind_host, listener_config.port);
            let tcp_listener = std::net::TcpListener::bind(addr)
                .map_err(|source| ListenerError::Bind { addr, source })?;
            tcp_listener
                .set_nonblocking(true)
                .map_err(|source| ListenerError::Bind { addr, source })?;

            let handle = self.handle.clone();
            let app = build_app(listener_config);

            if listener_config.tls {
                let tls_config = build_rustls_config(certs.clone())?;
                let rustls_config = RustlsConfig::from_config(Arc::new(tls_config));
                tokio::spawn(async move {
                    tracing::info!(%addr, "starting TLS listener");
                    if let Err(error) = axum_server::from_tcp_rustls(tcp_listener, rustls_config)
                        .handle(handle)
                        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                        .await
                    {
                        tracing::error!(%addr, %error, "TLS listener stopped with an error");
                    }
                });
            } else {
                tokio::spawn(async move {
                    tracing::info!(%addr, "starting plaintext listener");
                    if let Err(error) = axum_server::from_tcp(tcp_listener)
                        .handle(handle)
                        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                        .await
                    {
                        tracing::error!(%addr, %error, "listener stopped with an error");
                    }
                });
            }
        }
        Ok(())
    }

    /// Signals every listener to stop accepting new connections and waits up
    /// to `grace_period` for in-flight requests to finish.
    pub async fn shutdown(&self, grace_period: Duration) {
        self.handle.graceful_shutdown(Some(grace_period));
        loop {
            if self.handle.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

impl Default for PortListenerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn build_rustls_config(certs: Arc<CertificateRegistry>) -> Result<RustlsServerConfig, ListenerError> {
    let mut config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(certs);
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_plaintext_listener_on_ephemeral_port() {
        let supervisor = PortListenerSupervisor::new();
        let listeners = vec![ListenerConfig { port: 0, tls: false }];
        let certs = Arc::new(CertificateRegistry::new());
        let result = supervisor
            .start(
                "127.0.0.1".parse().unwrap(),
                &listeners,
                |_| Router::new(),
                certs,
            )
            .await;
        assert!(result.is_ok());
        supervisor.shutdown(Duration::from_millis(100)).await;
    }
}
