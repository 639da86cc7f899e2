//! Client IP extraction.
//!
//! IPv4-only by design: the detection pipeline's allow/deny IP lists and the
//! CC guard key off a single canonical address, and accepting IPv6 here
//! would silently bypass every IPv4 CIDR a host configures.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use http::HeaderMap;

use crate::config::TrustedProxiesConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientIpError {
    #[error("header '{0}' is present but does not contain a valid IPv4 address")]
    MalformedHeader(String),
    #[error("remote address '{0}' is not a valid IPv4 host:port pair")]
    InvalidRemoteAddr(String),
}

/// Resolve the client IP for one request.
///
/// Given `proxy_headers`, an ordered list of trusted header names: for each
/// header present on the request, split its value on `,`, take the first
/// element, trim it, and parse it as IPv4. A header that is present but
/// fails to parse as IPv4 fails the whole request rather than falling
/// through to the next header or the socket address — a malformed value is
/// treated as a sign the header is being tampered with, not absent.
///
/// Forwarded-for headers are only consulted when `trusted.is_trusted_ip`
/// accepts the directly connecting peer; otherwise (or if no header is
/// present) the connecting socket's address is used, and it must itself be
/// IPv4.
pub fn extract_client_ip(
    headers: &HeaderMap,
    remote_addr: SocketAddr,
    proxy_headers: &[String],
    trusted: &TrustedProxiesConfig,
) -> Result<Ipv4Addr, ClientIpError> {
    let peer_is_trusted = match remote_addr.ip() {
        IpAddr::V4(_) => {
            trusted.is_configured() && trusted.is_trusted_ip(remote_addr.ip(), &trusted.parsed_cidrs())
        }
        IpAddr::V6(_) => false,
    };

    if peer_is_trusted {
        for header_name in proxy_headers {
            let Some(value) = headers.get(header_name.as_str()).and_then(|v| v.to_str().ok())
            else {
                continue;
            };
            let first = value.split(',').next().unwrap_or("").trim();
            return first
                .parse::<Ipv4Addr>()
                .map_err(|_| ClientIpError::MalformedHeader(header_name.clone()));
        }
    }

    match remote_addr.ip() {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(_) => Err(ClientIpError::InvalidRemoteAddr(remote_addr.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn trusted() -> TrustedProxiesConfig {
        TrustedProxiesConfig {
            dangerously_trust_all: false,
            cidrs: vec!["10.0.0.0/8".to_string()],
        }
    }

    #[test]
    fn uses_socket_addr_when_peer_not_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let remote: SocketAddr = "198.51.100.1:1234".parse().unwrap();
        let ip = extract_client_ip(
            &headers,
            remote,
            &["X-Forwarded-For".to_string()],
            &trusted(),
        )
        .unwrap();
        assert_eq!(ip, "198.51.100.1".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn uses_first_trusted_header_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let remote: SocketAddr = "10.1.2.3:1234".parse().unwrap();
        let ip = extract_client_ip(
            &headers,
            remote,
            &["X-Forwarded-For".to_string()],
            &trusted(),
        )
        .unwrap();
        assert_eq!(ip, "203.0.113.9".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn checks_headers_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.5"));
        let remote: SocketAddr = "10.1.2.3:1234".parse().unwrap();
        let ip = extract_client_ip(
            &headers,
            remote,
            &["X-Forwarded-For".to_string(), "X-Real-IP".to_string()],
            &trusted(),
        )
        .unwrap();
        assert_eq!(ip, "203.0.113.5".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn malformed_trusted_header_fails_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        let remote: SocketAddr = "10.1.2.3:1234".parse().unwrap();
        let err = extract_client_ip(
            &headers,
            remote,
            &["X-Forwarded-For".to_string()],
            &trusted(),
        )
        .unwrap_err();
        assert_eq!(err, ClientIpError::MalformedHeader("X-Forwarded-For".to_string()));
    }

    #[test]
    fn ipv6_remote_addr_without_trusted_header_is_rejected() {
        let headers = HeaderMap::new();
        let remote: SocketAddr = "[2001:db8::1]:1234".parse().unwrap();
        let err = extract_client_ip(&headers, remote, &[], &trusted()).unwrap_err();
        assert!(matches!(err, ClientIpError::InvalidRemoteAddr(_)));
    }
}
