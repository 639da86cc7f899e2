//! Reverse-proxy stage: picks a backend from a host's load-balanced pool,
//! guarded by a per-backend circuit breaker, and forwards the request.

mod circuit_breaker;
mod load_balancer;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use load_balancer::LoadBalancer;

use std::net::IpAddr;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::model::Backend;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("host has no configured backends")]
    NoBackends,
    #[error("all backends are circuit-open")]
    AllBackendsDown,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("upstream loop detected: request would re-enter this engine")]
    UpstreamLoop,
}

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub backend_url: String,
    pub duration: std::time::Duration,
}

/// Forwards one request to the chosen backend of `backends`, recording the
/// outcome in `breakers` so a failing backend is skipped on subsequent picks.
pub struct ReverseProxyStage {
    client: reqwest::Client,
    breakers: circuit_breaker::CircuitBreakerRegistry,
}

impl ReverseProxyStage {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            breakers: circuit_breaker::CircuitBreakerRegistry::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn forward(
        &self,
        backends: &[Backend],
        strategy: crate::model::LoadBalanceStrategy,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Bytes,
        host_code: &str,
        client_ip: IpAddr,
        listening_ports: &[u16],
    ) -> Result<UpstreamResponse, ProxyError> {
        if backends.is_empty() {
            return Err(ProxyError::NoBackends);
        }

        // A backend whose own address is this client and whose port this engine
        // itself listens on would re-enter the engine rather than reach a real
        // upstream.
        let loops = backends.iter().any(|b| {
            b.remote_addr()
                .is_some_and(|(ip, port)| ip == client_ip && listening_ports.contains(&port))
        });
        if loops {
            return Err(ProxyError::UpstreamLoop);
        }

        let balancer = LoadBalancer::new(strategy);
        let mut attempted = 0usize;
        let mut last_err: Option<ProxyError> = None;

        while attempted < backends.len() {
            let Some(backend) = balancer.pick(backends, |b| {
                self.breakers.is_available(&b.url)
            }) else {
                break;
            };
            attempted += 1;

            let url = format!("{}{}", backend.url.trim_end_matches('/'), path_and_query);
            let start = Instant::now();
            let result = self
                .client
                .request(method.clone(), &url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    self.breakers.record_success(&backend.url);
                    let status = response.status();
                    let resp_headers = response.headers().clone();
                    let body = response.bytes().await?;
                    crate::observability::metrics::record_upstream_request(
                        host_code,
                        &backend.url,
                        true,
                        start.elapsed().as_secs_f64(),
                    );
                    return Ok(UpstreamResponse {
                        status,
                        headers: resp_headers,
                        body,
                        backend_url: backend.url.clone(),
                        duration: start.elapsed(),
                    });
                }
                Err(e) => {
                    self.breakers.record_failure(&backend.url);
                    crate::observability::metrics::record_upstream_request(
                        host_code,
                        &backend.url,
                        false,
                        start.elapsed().as_secs_f64(),
                    );
                    last_err = Some(ProxyError::Upstream(e));
                }
            }
        }

        Err(last_err.unwrap_or(ProxyError::AllBackendsDown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoadBalanceStrategy;

    #[tokio::test]
    async fn forward_with_no_backends_errors_immediately() {
        let stage = ReverseProxyStage::new(reqwest::Client::new());
        let result = stage
            .forward(
                &[],
                LoadBalanceStrategy::RoundRobin,
                Method::GET,
                "/",
                HeaderMap::new(),
                Bytes::new(),
                "h1",
                "203.0.113.9".parse().unwrap(),
                &[443],
            )
            .await;
        assert!(matches!(result, Err(ProxyError::NoBackends)));
    }

    #[tokio::test]
    async fn forward_detects_upstream_loop() {
        let stage = ReverseProxyStage::new(reqwest::Client::new());
        let backends = vec![Backend {
            url: "http://203.0.113.9:8443".into(),
            weight: 1,
        }];
        let result = stage
            .forward(
                &backends,
                LoadBalanceStrategy::RoundRobin,
                Method::GET,
                "/",
                HeaderMap::new(),
                Bytes::new(),
                "h1",
                "203.0.113.9".parse().unwrap(),
                &[8443],
            )
            .await;
        assert!(matches!(result, Err(ProxyError::UpstreamLoop)));
    }

    #[tokio::test]
    async fn forward_allows_backend_matching_client_ip_on_other_port() {
        // Same remote IP, but the backend's port isn't one this engine
        // listens on: not a loop, just an ordinary (if unreachable in this
        // test) upstream attempt.
        let stage = ReverseProxyStage::new(reqwest::Client::new());
        let backends = vec![Backend {
            url: "http://203.0.113.9:9000".into(),
            weight: 1,
        }];
        let result = stage
            .forward(
                &backends,
                LoadBalanceStrategy::RoundRobin,
                Method::GET,
                "/",
                HeaderMap::new(),
                Bytes::new(),
                "h1",
                "203.0.113.9".parse().unwrap(),
                &[8443],
            )
            .await;
        assert!(!matches!(result, Err(ProxyError::UpstreamLoop)));
    }
}
