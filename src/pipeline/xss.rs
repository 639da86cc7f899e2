use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{
    Checker, RequestContext,
    signatures::{Signature, SignatureSet},
};

static SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("xss-script-tag", r"(?i)<script[\s>]"),
        Signature::new("xss-on-event", r"(?i)\bon(error|load|click|mouseover|focus)\s*="),
        Signature::new("xss-javascript-uri", r"(?i)javascript:"),
        Signature::new("xss-img-onerror", r"(?i)<img[^>]+onerror"),
        Signature::new("xss-svg-onload", r"(?i)<svg[^>]+onload"),
        Signature::new("xss-iframe", r"(?i)<iframe[\s>]"),
        Signature::new("xss-document-cookie", r"(?i)document\.cookie"),
        Signature::new("xss-eval", r"(?i)\beval\s*\("),
    ])
});

/// Signature-based cross-site-scripting guard.
pub struct XssChecker;

impl XssChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for XssChecker {
    fn name(&self) -> &'static str {
        "xss"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.xss {
            return DetectionResult::pass();
        }
        let candidates = [Some(ctx.uri_path), Some(ctx.query), ctx.body_peek];
        for candidate in candidates.into_iter().flatten() {
            if let Some(name) = SIGNATURES.first_match(candidate) {
                return DetectionResult::block(
                    name,
                    "Cross-Site Scripting Detected",
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
    fn detects_script_tag() {
        let checker = XssChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/comment",
            query: "body=<script>alert(1)</script>",
            headers: &headers,
            body_peek: None,
        };
        assert!(checker.check(&ctx).is_block);
    }
}
