//! Host routing table: resolves an inbound `(host header, port)` pair to the
//! `HostSafe` snapshot that should handle it.
//!
//! Entries are held behind `Arc` in concurrent maps so a reload only ever
//! swaps one host's pointer; requests already holding the old `Arc` finish
//! against a consistent, if slightly stale, snapshot.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::model::HostSafe;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("host code '{0}' is not registered")]
    UnknownCode(String),
}

/// Thread-safe, atomically-updatable host routing table.
pub struct HostRoutingTable {
    /// Hosts scoped to a specific port.
    by_host_port: DashMap<(String, u16), Arc<HostSafe>>,
    /// Hosts with no port restriction (`unrestricted_port` or `port: None`),
    /// keyed by host name alone.
    no_port: DashMap<String, Arc<HostSafe>>,
    /// Every host keyed by its stable code, independent of host name/port,
    /// for reload/clear operations driven by code rather than by request.
    by_code: DashMap<String, Arc<HostSafe>>,
    /// The sentinel host used when nothing else matches.
    global: RwLock<Arc<HostSafe>>,
}

impl HostRoutingTable {
    pub fn new(global_host_name: &str) -> Self {
        Self {
            by_host_port: DashMap::new(),
            no_port: DashMap::new(),
            by_code: DashMap::new(),
            global: RwLock::new(Arc::new(HostSafe::global(global_host_name))),
        }
    }

    /// Replace the full set of hosts in one pass. Used at startup and by
    /// `ReloadAllHosts`.
    pub fn load_all(&self, hosts: Vec<HostSafe>) {
        self.by_host_port.clear();
        self.no_port.clear();
        self.by_code.clear();
        for host in hosts {
            self.upsert_host(host);
        }
    }

    /// Insert or atomically replace a single host. Used at startup and by
    /// `ReloadHost`.
    pub fn upsert_host(&self, host: HostSafe) {
        let host = Arc::new(host);
        self.by_code.insert(host.code.clone(), host.clone());

        for name in &host.host_names {
            if let Some(port) = host.port
                && !host.unrestricted_port
            {
                self.by_host_port
                    .insert((name.clone(), port), host.clone());
            } else {
                self.no_port.insert(name.clone(), host.clone());
            }
        }
    }

    /// Remove a host by its code from every index (`ClearProxy`).
    pub fn clear_proxy(&self, code: &str) -> Result<(), RoutingError> {
        let Some((_, host)) = self.by_code.remove(code) else {
            return Err(RoutingError::UnknownCode(code.to_string()));
        };
        for name in &host.host_names {
            if let Some(port) = host.port {
                self.by_host_port.remove(&(name.clone(), port));
            }
            self.no_port.remove(name);
        }
        Ok(())
    }

    pub fn replace_global(&self, host: HostSafe) {
        *self.global.write().unwrap() = Arc::new(host);
    }

    /// The current Global Host snapshot, independent of request resolution.
    /// Used by the response rewriter to consult the Global Host's LDP rules
    /// even when the request resolved to a different, specific host.
    pub fn global_host(&self) -> Arc<HostSafe> {
        self.global.read().unwrap().clone()
    }

    pub fn get_by_code(&self, code: &str) -> Option<Arc<HostSafe>> {
        self.by_code.get(code).map(|e| e.value().clone())
    }

    /// Resolve the `HostSafe` responsible for `host_name` on `port`.
    ///
    /// Falls back from the exact `(host, port)` match, to a port-agnostic
    /// match on the same host name, to the Global Host.
    pub fn resolve(&self, host_name: &str, port: u16) -> Arc<HostSafe> {
        if let Some(host) = self.by_host_port.get(&(host_name.to_string(), port)) {
            return host.value().clone();
        }
        if let Some(host) = self.no_port.get(host_name) {
            return host.value().clone();
        }
        self.global.read().unwrap().clone()
    }

    /// All ports any configured host listens on, for the Port Listener
    /// Supervisor to enumerate at startup (`EnumPorts`).
    pub fn enum_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.by_host_port.iter().map(|e| e.key().1).collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub fn host_count(&self) -> usize {
        self.by_code.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HostConfig;

    fn host(code: &str, name: &str, port: Option<u16>, unrestricted: bool) -> HostSafe {
        let config = HostConfig {
            code: code.into(),
            host_names: vec![name.into()],
            port,
            unrestricted_port: unrestricted,
            ..Default::default()
        };
        HostSafe::from_config(&config).unwrap()
    }

    #[test]
    fn resolves_exact_host_port_match() {
        let table = HostRoutingTable::new("_global_");
        table.upsert_host(host("h1", "a.example.com", Some(8443), false));
        let resolved = table.resolve("a.example.com", 8443);
        assert_eq!(resolved.code, "h1");
    }

    #[test]
    fn falls_back_to_no_port_then_global() {
        let table = HostRoutingTable::new("_global_");
        table.upsert_host(host("h2", "b.example.com", None, true));
        assert_eq!(table.resolve("b.example.com", 9999).code, "h2");
        assert_eq!(table.resolve("unknown.example.com", 80).code, "_global_");
    }

    #[test]
    fn clear_proxy_removes_from_every_index() {
        let table = HostRoutingTable::new("_global_");
        table.upsert_host(host("h3", "c.example.com", Some(443), false));
        table.clear_proxy("h3").unwrap();
        assert_eq!(table.resolve("c.example.com", 443).code, "_global_");
        assert!(table.get_by_code("h3").is_none());
    }

    #[test]
    fn clear_proxy_unknown_code_errors() {
        let table = HostRoutingTable::new("_global_");
        assert!(table.clear_proxy("missing").is_err());
    }

    #[test]
    fn enum_ports_deduplicates() {
        let table = HostRoutingTable::new("_global_");
        table.upsert_host(host("h4", "d.example.com", Some(443), false));
        table.upsert_host(host("h5", "e.example.com", Some(443), false));
        table.upsert_host(host("h6", "f.example.com", Some(8443), false));
        assert_eq!(table.enum_ports(), vec![443, 8443]);
    }
}
