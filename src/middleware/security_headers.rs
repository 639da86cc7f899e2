//! Security headers stamped onto every response the engine returns,
//! independent of whether it came from a guard block or an upstream backend.

use http::{HeaderValue, Response};

use crate::config::SecurityHeadersConfig;

/// Adds the engine's fixed security headers to `response` in place.
///
/// `is_tls` gates `Strict-Transport-Security`: it only makes sense to tell a
/// client to upgrade to HTTPS when the connection it just made was already
/// HTTPS.
pub fn apply_security_headers<B>(
    response: &mut Response<B>,
    config: &SecurityHeadersConfig,
    is_tls: bool,
) {
    if !config.enabled {
        return;
    }

    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::try_from(config.waf_header_value.as_str()) {
        headers.insert("waf", value);
    }
    if let Ok(value) = HeaderValue::try_from(config.server_header_value.as_str()) {
        headers.insert(http::header::SERVER, value);
    }
    if let Ok(value) = HeaderValue::try_from(config.xss_protection.as_str()) {
        headers.insert("x-xss-protection", value);
    }
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));

    if config.hsts.enabled && is_tls {
        let mut value = format!("max-age={}", config.hsts.max_age_secs);
        if config.hsts.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if let Ok(value) = HeaderValue::try_from(value) {
            headers.insert("strict-transport-security", value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn stamps_waf_and_server_headers() {
        let mut response = Response::new(Body::empty());
        apply_security_headers(&mut response, &SecurityHeadersConfig::default(), true);
        assert_eq!(response.headers().get("waf").unwrap(), "SamWAF");
        assert_eq!(response.headers().get(http::header::SERVER).unwrap(), "SamWAFServer");
    }

    #[test]
    fn hsts_only_applies_over_tls() {
        let mut config = SecurityHeadersConfig::default();
        config.hsts.enabled = true;
        let mut response = Response::new(Body::empty());
        apply_security_headers(&mut response, &config, false);
        assert!(response.headers().get("strict-transport-security").is_none());

        let mut response = Response::new(Body::empty());
        apply_security_headers(&mut response, &config, true);
        assert!(response.headers().get("strict-transport-security").is_some());
    }

    #[test]
    fn disabled_config_adds_nothing() {
        let mut config = SecurityHeadersConfig::default();
        config.enabled = false;
        let mut response = Response::new(Body::empty());
        apply_security_headers(&mut response, &config, true);
        assert!(response.headers().get("waf").is_none());
    }
}
