use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{Checker, RequestContext};

/// Built-in dictionary of sensitive terms that should never appear as plain
/// request parameters (credential/PII field names commonly abused to smuggle
/// secrets through query strings or form bodies).
const DICTIONARY: &[&str] = &[
    "password=",
    "passwd=",
    "secret=",
    "api_key=",
    "apikey=",
    "access_token=",
    "private_key=",
    "idcard=",
    "id_card=",
    "bank_card=",
    "credit_card=",
];

static MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(DICTIONARY)
        .expect("built-in sensitive dictionary must build")
});

/// Last guard in the chain: flags requests that try to pass credential-shaped
/// fields in the clear through the URL or request body.
pub struct SensitiveChecker;

impl SensitiveChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for SensitiveChecker {
    fn name(&self) -> &'static str {
        "sensitive"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.sensitive {
            return DetectionResult::pass();
        }
        let candidates = [Some(ctx.query), ctx.body_peek];
        for candidate in candidates.into_iter().flatten() {
            if let Some(m) = MATCHER.find(candidate) {
                let term = DICTIONARY[m.pattern()];
                return DetectionResult::block(
                    "sensitive",
                    "Sensitive Field Exposed",
                    format!("request contained sensitive field '{term}' in cleartext"),
                );
            }
        }
        DetectionResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use std::{net::IpAddr, sync::Arc};

    use http::{HeaderMap, Method};

    use super::*;
    use crate::model::HostSafe;

    #[test]
    fn blocks_cleartext_password_field() {
        let checker = SensitiveChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/login",
            query: "user=alice&password=hunter2",
            headers: &headers,
            body_peek: None,
        };
        assert!(checker.check(&ctx).is_block);
    }

    #[test]
    fn passes_request_without_sensitive_fields() {
        let checker = SensitiveChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/login",
            query: "user=alice",
            headers: &headers,
            body_peek: None,
        };
        assert!(!checker.check(&ctx).is_block);
    }
}
