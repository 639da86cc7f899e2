use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{
    Checker, RequestContext,
    signatures::{Signature, SignatureSet},
};

static PATH_SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("scanner-wp-admin", r"(?i)/wp-(admin|login|content)"),
        Signature::new("scanner-phpmyadmin", r"(?i)/phpmyadmin"),
        Signature::new("scanner-git-dir", r"/\.git/"),
        Signature::new("scanner-env-file", r"/\.env$"),
        Signature::new("scanner-backup-archive", r"(?i)\.(bak|old|sql|zip|tar\.gz)$"),
        Signature::new("scanner-admin-console", r"(?i)/(actuator|console|manager/html)"),
    ])
});

static USER_AGENT_SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("scanner-ua-nikto", r"(?i)nikto"),
        Signature::new("scanner-ua-sqlmap", r"(?i)sqlmap"),
        Signature::new("scanner-ua-nmap", r"(?i)nmap"),
        Signature::new("scanner-ua-masscan", r"(?i)masscan"),
        Signature::new("scanner-ua-dirbuster", r"(?i)dirbuster"),
        Signature::new("scanner-ua-gobuster", r"(?i)gobuster"),
        Signature::new("scanner-ua-zgrab", r"(?i)zgrab"),
    ])
});

/// Guard against vulnerability scanners: known scanner user agents and
/// known-sensitive paths scanners probe for.
pub struct ScannerChecker;

impl ScannerChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for ScannerChecker {
    fn name(&self) -> &'static str {
        "scanner"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.scanner {
            return DetectionResult::pass();
        }
        if let Some(name) = PATH_SIGNATURES.first_match(ctx.uri_path) {
            return DetectionResult::block(
                name,
                "Scanner Probe Detected",
                format!("requested path matched scanner signature '{name}'"),
            );
        }
        if let Some(ua) = ctx.header_str("user-agent")
            && let Some(name) = USER_AGENT_SIGNATURES.first_match(ua)
        {
            return DetectionResult::block(
                name,
                "Scanner Tool Detected",
                format!("user-agent matched scanner signature '{name}'"),
            );
        }
        DetectionResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use std::{net::IpAddr, sync::Arc};

    use http::{HeaderMap, HeaderValue, Method};

    use super::*;
    use crate::model::HostSafe;

    #[test]
    fn detects_known_scanner_user_agent() {
        let checker = ScannerChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("sqlmap/1.7"));
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/",
            query: "",
            headers: &headers,
            body_peek: None,
        };
        assert!(checker.check(&ctx).is_block);
    }

    #[test]
    fn detects_git_directory_probe() {
        let checker = ScannerChecker::new();
        let host = Arc::new(HostSafe::global("_global_"));
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/.git/config",
            query: "",
            headers: &headers,
            body_peek: None,
        };
        assert!(checker.check(&ctx).is_block);
    }
}
