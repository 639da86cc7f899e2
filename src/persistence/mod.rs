//! Host persistence: where `HostConfig` entries come from at startup and on
//! reload, independent of how they are transported over the wire.

use async_trait::async_trait;

use crate::model::HostConfig;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("host '{0}' not found")]
    NotFound(String),
    #[error("backing store error: {0}")]
    Backend(String),
}

/// Source of truth for host configuration, consulted by the Engine Facade on
/// `Start`, `ReloadHost`, and `ReloadAllHosts`.
#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<HostConfig>, RepositoryError>;
    async fn load_one(&self, code: &str) -> Result<HostConfig, RepositoryError>;
}

/// Repository backed by the hosts embedded in the engine's own TOML config.
/// Reload is a no-op: there is nowhere else to read from.
pub struct StaticHostRepository {
    hosts: Vec<HostConfig>,
}

impl StaticHostRepository {
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Self { hosts }
    }
}

#[async_trait]
impl HostRepository for StaticHostRepository {
    async fn load_all(&self) -> Result<Vec<HostConfig>, RepositoryError> {
        Ok(self.hosts.clone())
    }

    async fn load_one(&self, code: &str) -> Result<HostConfig, RepositoryError> {
        self.hosts
            .iter()
            .find(|h| h.code == code)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(code.to_string()))
    }
}
