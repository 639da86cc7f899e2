use crate::model::DetectionResult;

use super::{Checker, RequestContext};

/// First guard in the chain: a matching allow-listed IP jumps straight to
/// the proxy stage, skipping every guard after `AllowURL`.
pub struct AllowIpChecker;

impl Checker for AllowIpChecker {
    fn name(&self) -> &'static str {
        "allow-ip"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if ctx.host.is_ip_allowed(ctx.client_ip) {
            DetectionResult::jump()
        } else {
            DetectionResult::pass()
        }
    }
}

/// Second guard: a matching allow-listed URL jumps straight to the proxy stage.
pub struct AllowUrlChecker;

impl Checker for AllowUrlChecker {
    fn name(&self) -> &'static str {
        "allow-url"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        let uri = ctx.full_uri();
        let matched = ctx
            .host
            .allow_url
            .iter()
            .any(|rule| rule.match_type.matches(&uri, &rule.pattern));
        if matched {
            DetectionResult::jump()
        } else {
            DetectionResult::pass()
        }
    }
}

/// Third guard, only reached when AllowIP/AllowURL did not jump: a matching
/// denied IP blocks the request outright.
pub struct DenyIpChecker;

impl Checker for DenyIpChecker {
    fn name(&self) -> &'static str {
        "deny-ip"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if ctx.host.is_ip_denied(ctx.client_ip) {
            DetectionResult::block("deny-ip", "IP Denied", format!("{} is on the deny list", ctx.client_ip))
        } else {
            DetectionResult::pass()
        }
    }
}

/// Fourth guard: a matching denied URL pattern blocks the request.
pub struct DenyUrlChecker;

impl Checker for DenyUrlChecker {
    fn name(&self) -> &'static str {
        "deny-url"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        let uri = ctx.full_uri();
        let matched = ctx
            .host
            .deny_url
            .iter()
            .find(|rule| rule.match_type.matches(&uri, &rule.pattern));
        match matched {
            Some(rule) => DetectionResult::block(
                "deny-url",
                "URL Denied",
                format!("{} matched denied pattern '{}'", uri, rule.pattern),
            ),
            None => DetectionResult::pass(),
        }
    }
}
