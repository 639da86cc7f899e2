use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{
    Checker, RequestContext,
    signatures::{Signature, SignatureSet},
};

static SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("sqli-union-select", r"(?i)union\s+(all\s+)?select"),
        Signature::new("sqli-boolean", r"(?i)\bor\b\s+\d+\s*=\s*\d+"),
        Signature::new("sqli-comment", r"(?:--|#|/\*)\s*$"),
        Signature::new("sqli-stacked", r"(?i);\s*(drop|insert|update|delete)\s"),
        Signature::new("sqli-sleep", r"(?i)sleep\(\s*\d+\s*\)"),
        Signature::new("sqli-benchmark", r"(?i)benchmark\(\s*\d+"),
        Signature::new(
            "sqli-information-schema",
            r"(?i)information_schema\.(tables|columns)",
        ),
        Signature::new("sqli-extractvalue", r"(?i)extractvalue\("),
        Signature::new("sqli-xp-cmdshell", r"(?i)xp_cmdshell"),
    ])
});

/// Signature-based SQL-injection guard, scanning the URI, query string, and
/// any buffered request body for known SQLi markers.
pub struct SqliChecker;

impl SqliChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for SqliChecker {
    fn name(&self) -> &'static str {
        "sqli"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.sqli {
            return DetectionResult::pass();
        }
        let candidates = [Some(ctx.uri_path), Some(ctx.query), ctx.body_peek];
        for candidate in candidates.into_iter().flatten() {
            if let Some(name) = SIGNATURES.first_match(candidate) {
                return DetectionResult::block(
                    name,
                    "SQL Injection Detected",
                    format!("matched signature '{name}'"),
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
    fn detects_union_select_in_query() {
        let checker = SqliChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/search",
            query: "id=1 UNION SELECT password FROM users",
            headers: &headers,
            body_peek: None,
        };
        let result = checker.check(&ctx);
        assert!(result.is_block);
        assert_eq!(result.rule_name, "sqli-union-select");
    }

    #[test]
    fn passes_benign_query() {
        let checker = SqliChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/search",
            query: "q=hello+world",
            headers: &headers,
            body_peek: None,
        };
        assert!(!checker.check(&ctx).is_block);
    }
}
