//! Engine Facade: the single object a deployment starts, stops, and reloads
//! against. It owns every collaborator (routing table, detection pipeline,
//! certificate registry, reverse-proxy stage, response rewriter, event
//! queue, host repository, GeoIP lookup) and the HTTP handler that ties them
//! together for one request.

mod handler;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use crate::certs::CertificateRegistry;
use crate::config::EngineConfig;
use crate::geoip::GeoLookup;
use crate::listener::{ListenerError, PortListenerSupervisor};
use crate::model::{HostBuildError, HostSafe};
use crate::persistence::{HostRepository, RepositoryError};
use crate::pipeline::DetectionPipeline;
use crate::proxy::ReverseProxyStage;
use crate::queue::EventQueue;
use crate::rewrite::ResponseRewriter;
use crate::routing::{HostRoutingTable, RoutingError};

pub use handler::ListenerMeta;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    HostBuild(#[from] HostBuildError),
    #[error(transparent)]
    Cert(#[from] crate::certs::CertError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("failed to build upstream HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("host '{0}' failed validation: {1}")]
    InvalidHost(String, String),
}

/// The running WAF: a host routing table, an ordered detection pipeline, a
/// certificate registry, and the reverse-proxy/rewrite stages that sit
/// between them, all addressable through one lifecycle.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) routing: HostRoutingTable,
    pub(crate) pipeline: DetectionPipeline,
    pub(crate) certs: Arc<CertificateRegistry>,
    pub(crate) queue: Arc<dyn EventQueue>,
    pub(crate) repository: Arc<dyn HostRepository>,
    pub(crate) geo: Arc<dyn GeoLookup>,
    pub(crate) proxy: ReverseProxyStage,
    pub(crate) rewriter: ResponseRewriter,
    listeners: PortListenerSupervisor,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn HostRepository>,
        queue: Arc<dyn EventQueue>,
        geo: Arc<dyn GeoLookup>,
    ) -> Result<Arc<Self>, EngineError> {
        let client = config.server.http_client.build_client()?;
        let routing = HostRoutingTable::new(&config.global_host.global_host_name);
        let rewriter = ResponseRewriter::new(config.server.max_response_body_bytes);

        Ok(Arc::new(Self {
            config,
            routing,
            pipeline: DetectionPipeline::new(),
            certs: Arc::new(CertificateRegistry::new()),
            queue,
            repository,
            geo,
            proxy: ReverseProxyStage::new(client),
            rewriter,
            listeners: PortListenerSupervisor::new(),
        }))
    }

    /// Loads every host from the repository, binds every configured
    /// listener, and starts serving. Returns once listeners are bound; it
    /// does not block for the lifetime of the process.
    pub async fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        self.reload_all_hosts().await?;

        let engine = self.clone();
        let app: Router = handler::build_router(engine);

        self.listeners
            .start(
                self.config.server.host,
                &self.config.server.listeners,
                |listener_config| {
                    app.clone().layer(axum::Extension(ListenerMeta {
                        port: listener_config.port,
                        tls: listener_config.tls,
                    }))
                },
                self.certs.clone(),
            )
            .await?;

        tracing::info!(hosts = self.routing.host_count(), "engine started");
        Ok(())
    }

    pub async fn stop(&self) {
        self.listeners.shutdown(Duration::from_secs(10)).await;
        tracing::info!("engine stopped");
    }

    /// Reload a single host by code from the repository (`ReloadHost`).
    pub async fn reload_host(&self, code: &str) -> Result<(), EngineError> {
        let config = self.repository.load_one(code).await?;
        config
            .validate()
            .map_err(|e| EngineError::InvalidHost(config.code.clone(), e))?;
        self.certs.load_host(&config)?;
        let built = HostSafe::from_config(&config)?;
        if config.global_host {
            self.routing.replace_global(built);
        } else {
            self.routing.upsert_host(built);
        }
        Ok(())
    }

    /// Reload every host from the repository (`ReloadAllHosts`).
    pub async fn reload_all_hosts(&self) -> Result<(), EngineError> {
        let configs = self.repository.load_all().await?;
        let mut hosts = Vec::with_capacity(configs.len());
        for config in &configs {
            config
                .validate()
                .map_err(|e| EngineError::InvalidHost(config.code.clone(), e))?;
            self.certs.load_host(config)?;
            let built = HostSafe::from_config(config)?;
            if config.global_host {
                self.routing.replace_global(built);
            } else {
                hosts.push(built);
            }
        }
        self.routing.load_all(hosts);
        Ok(())
    }

    /// The sensitive-field dictionary is compiled into the binary; there is
    /// nothing external to reload. Kept as an explicit lifecycle operation
    /// for API symmetry with the other `Reload*` calls.
    pub fn reload_sensitive(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Remove a host from the routing table entirely (`ClearProxy`).
    pub fn clear_proxy(&self, code: &str) -> Result<(), EngineError> {
        if let Some(host) = self.routing.get_by_code(code) {
            self.certs.remove_host_names(&host.host_names);
        }
        self.routing.clear_proxy(code).map_err(EngineError::from)
    }

    /// Every port a configured host listens on (`EnumPorts`).
    pub fn enum_ports(&self) -> Vec<u16> {
        self.routing.enum_ports()
    }
}
