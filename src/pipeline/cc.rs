use std::{
    net::IpAddr,
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::model::DetectionResult;

use super::{Checker, RequestContext};

struct Window {
    started_at: Instant,
    count: u32,
}

/// CC (flood / brute-force) guard: a fixed window per `(host, client_ip)`.
/// Once a client exceeds `anti_cc.max_requests` within `window_secs`, it is
/// blocked for `anti_cc.block_secs`, independent of whether the window has
/// since rolled over.
pub struct CcChecker {
    windows: DashMap<(String, IpAddr), Window>,
    blocked_until: DashMap<(String, IpAddr), Instant>,
}

impl CcChecker {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            blocked_until: DashMap::new(),
        }
    }
}

impl Checker for CcChecker {
    fn name(&self) -> &'static str {
        "cc"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        let cc = &ctx.host.anti_cc;
        if !cc.enabled {
            return DetectionResult::pass();
        }
        let key = (ctx.host.code.clone(), ctx.client_ip);
        let now = Instant::now();

        if let Some(until) = self.blocked_until.get(&key) {
            if now < *until {
                return DetectionResult::block(
                    "cc",
                    "Request Flood Detected",
                    format!("{} is temporarily blocked for exceeding the request rate", ctx.client_ip),
                );
            }
            drop(until);
            self.blocked_until.remove(&key);
        }

        let mut entry = self.windows.entry(key.clone()).or_insert_with(|| Window {
            started_at: now,
            count: 0,
        });

        if now.duration_since(entry.started_at) > Duration::from_secs(cc.window_secs) {
            entry.started_at = now;
            entry.count = 0;
        }
        entry.count += 1;

        if entry.count > cc.max_requests {
            drop(entry);
            self.blocked_until
                .insert(key, now + Duration::from_secs(cc.block_secs));
            return DetectionResult::block(
                "cc",
                "Request Flood Detected",
                format!(
                    "{} exceeded {} requests in {}s",
                    ctx.client_ip, cc.max_requests, cc.window_secs
                ),
            );
        }

        DetectionResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::{HeaderMap, Method};

    use super::*;
    use crate::model::{AntiCcConfig, HostConfig};

    fn ctx_for<'a>(host: Arc<crate::model::HostSafe>, headers: &'a HeaderMap, method: &'a Method) -> RequestContext<'a> {
        RequestContext {
            host,
            client_ip: "198.51.100.7".parse::<IpAddr>().unwrap(),
            method,
            uri_path: "/",
            query: "",
            headers,
            body_peek: None,
        }
    }

    #[test]
    fn blocks_after_exceeding_window() {
        let config = HostConfig {
            code: "h1".into(),
            host_names: vec!["example.com".into()],
            anti_cc: AntiCcConfig {
                enabled: true,
                window_secs: 60,
                max_requests: 2,
                block_secs: 60,
            },
            ..Default::default()
        };
        let host = Arc::new(crate::model::HostSafe::from_config(&config).unwrap());
        let checker = CcChecker::new();
        let headers = HeaderMap::new();
        let method = Method::GET;

        assert!(!checker.check(&ctx_for(host.clone(), &headers, &method)).is_block);
        assert!(!checker.check(&ctx_for(host.clone(), &headers, &method)).is_block);
        assert!(checker.check(&ctx_for(host.clone(), &headers, &method)).is_block);
        // Still blocked on the next request, even though the window hasn't rolled over.
        assert!(checker.check(&ctx_for(host, &headers, &method)).is_block);
    }

    #[test]
    fn disabled_guard_always_passes() {
        let host = Arc::new(crate::model::HostSafe::global("_global_"));
        let checker = CcChecker::new();
        let headers = HeaderMap::new();
        let method = Method::GET;
        for _ in 0..500 {
            assert!(!checker.check(&ctx_for(host.clone(), &headers, &method)).is_block);
        }
    }
}
