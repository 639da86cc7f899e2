use std::{net::IpAddr, time::Duration};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// One TCP port the engine listens on.
///
/// Each listener is independent: the same `HostSafe` can be reachable on
/// several listeners (e.g. plain `:80` redirecting to `:443`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    /// Port to bind.
    pub port: u16,

    /// Whether this listener terminates TLS.
    ///
    /// TLS listeners use the certificate registry (SNI-keyed, one certificate
    /// per host) rather than a single global certificate.
    #[serde(default)]
    pub tls: bool,
}

/// Top-level HTTP server configuration: listeners, proxy trust, limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind all listeners to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Ports the engine listens on. Defaults to plain `:80` and TLS `:443`.
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,

    /// Request body size limit in bytes, before `RECORD_MAX_BODY_LENGTH` is applied
    /// per-host. This is the hard ceiling the listener itself enforces.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Maximum response body buffered for rewriting (LDP masking, compression).
    #[serde(default = "default_max_response_body")]
    pub max_response_body_bytes: usize,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Trusted proxy configuration for deciding whether to honor forwarded-for headers.
    #[serde(default)]
    pub trusted_proxies: TrustedProxiesConfig,

    /// Headers added to every response.
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,

    /// HTTP client used for upstream (backend) requests.
    #[serde(default)]
    pub http_client: HttpClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            listeners: default_listeners(),
            body_limit_bytes: default_body_limit(),
            max_response_body_bytes: default_max_response_body(),
            timeout_secs: default_timeout(),
            trusted_proxies: TrustedProxiesConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_listeners() -> Vec<ListenerConfig> {
    vec![
        ListenerConfig {
            port: 80,
            tls: false,
        },
        ListenerConfig {
            port: 443,
            tls: true,
        },
    ]
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

fn default_max_response_body() -> usize {
    50 * 1024 * 1024
}

fn default_timeout() -> u64 {
    30
}

/// Configuration for trusted reverse proxies in front of this engine.
///
/// **Security note:** honoring a forwarded-for header from an untrusted peer lets
/// an attacker spoof their source IP and bypass every IP-based guard in the
/// detection pipeline. Only enable this when the connecting peer is known to be
/// a proxy that sets (and cannot be told to forge) the header.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TrustedProxiesConfig {
    /// Trust forwarded-for headers from any connecting peer.
    #[serde(default)]
    pub dangerously_trust_all: bool,

    /// CIDR ranges of peers whose forwarded-for headers are honored.
    #[serde(default)]
    pub cidrs: Vec<String>,
}

impl TrustedProxiesConfig {
    pub fn parsed_cidrs(&self) -> Vec<IpNet> {
        self.cidrs
            .iter()
            .filter_map(|cidr_str| {
                cidr_str.parse::<IpNet>().ok().or_else(|| {
                    tracing::warn!(cidr = %cidr_str, "invalid CIDR in trusted_proxies config, skipping");
                    None
                })
            })
            .collect()
    }

    pub fn is_trusted_ip(&self, ip: IpAddr, parsed_cidrs: &[IpNet]) -> bool {
        if self.dangerously_trust_all {
            return true;
        }
        parsed_cidrs.iter().any(|cidr| cidr.contains(&ip))
    }

    pub fn is_configured(&self) -> bool {
        self.dangerously_trust_all || !self.cidrs.is_empty()
    }
}

/// Response headers the engine stamps onto every reply, WAF-branded and fixed
/// rather than freely configurable: a spoofed `Server` header is part of the
/// product's fingerprint-hiding behavior, not an optional hardening knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_waf_header")]
    pub waf_header_value: String,

    #[serde(default = "default_server_header")]
    pub server_header_value: String,

    #[serde(default = "default_xss_protection")]
    pub xss_protection: String,

    #[serde(default)]
    pub hsts: HstsConfig,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            waf_header_value: default_waf_header(),
            server_header_value: default_server_header(),
            xss_protection: default_xss_protection(),
            hsts: HstsConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_waf_header() -> String {
    "SamWAF".to_string()
}

fn default_server_header() -> String {
    "SamWAFServer".to_string()
}

fn default_xss_protection() -> String {
    "1; mode=block".to_string()
}

/// HTTP Strict Transport Security configuration, sent only over TLS listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HstsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_hsts_max_age")]
    pub max_age_secs: u64,

    #[serde(default)]
    pub include_subdomains: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age_secs: default_hsts_max_age(),
            include_subdomains: false,
        }
    }
}

fn default_hsts_max_age() -> u64 {
    31536000
}

/// HTTP client configuration used when proxying requests to backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    #[serde(default = "default_http_client_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_http_client_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_client_timeout(),
            connect_timeout_secs: default_http_client_connect_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

impl HttpClientConfig {
    /// Build the shared reqwest client used by the reverse-proxy stage.
    ///
    /// Redirects are never followed here: the WAF proxies exactly one upstream
    /// hop and returns whatever the backend sends, redirects included, to the client.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .tcp_nodelay(self.tcp_nodelay)
            .redirect(reqwest::redirect::Policy::none())
            .build()
    }
}

fn default_http_client_timeout() -> u64 {
    30
}

fn default_http_client_connect_timeout() -> u64 {
    5
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_tcp_nodelay() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listeners_cover_http_and_https() {
        let listeners = default_listeners();
        assert_eq!(listeners.len(), 2);
        assert!(listeners.iter().any(|l| l.port == 80 && !l.tls));
        assert!(listeners.iter().any(|l| l.port == 443 && l.tls));
    }

    #[test]
    fn trusted_proxies_default_trusts_nothing() {
        let config = TrustedProxiesConfig::default();
        assert!(!config.is_configured());
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(!config.is_trusted_ip(ip, &config.parsed_cidrs()));
    }

    #[test]
    fn trusted_proxies_cidr_match() {
        let config = TrustedProxiesConfig {
            dangerously_trust_all: false,
            cidrs: vec!["10.0.0.0/8".to_string()],
        };
        let cidrs = config.parsed_cidrs();
        assert!(config.is_trusted_ip("10.1.2.3".parse().unwrap(), &cidrs));
        assert!(!config.is_trusted_ip("192.168.1.1".parse().unwrap(), &cidrs));
    }

    #[test]
    fn http_client_builds() {
        assert!(HttpClientConfig::default().build_client().is_ok());
    }

    #[test]
    fn security_headers_defaults_match_branding() {
        let config = SecurityHeadersConfig::default();
        assert_eq!(config.waf_header_value, "SamWAF");
        assert_eq!(config.server_header_value, "SamWAFServer");
        assert_eq!(config.xss_protection, "1; mode=block");
    }
}
