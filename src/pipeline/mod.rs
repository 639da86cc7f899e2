//! The ordered detection pipeline.
//!
//! Guards run in a fixed order. `AllowIP` and `AllowURL` can set
//! `jump_remaining_guards`, which skips straight to the proxy stage; every
//! other guard can only block or pass. The first guard to block wins and the
//! rest are never evaluated.

mod allow_deny;
mod bot;
mod cc;
mod context;
mod custom_rules;
mod rce;
mod scanner;
mod sensitive;
mod signatures;
mod sqli;
mod xss;

pub use context::RequestContext;

use crate::model::DetectionResult;

/// One stage of the detection pipeline.
pub trait Checker: Send + Sync {
    /// Name used in metrics and `DetectionResult::rule_name` when this guard
    /// doesn't supply a more specific one.
    fn name(&self) -> &'static str;

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult;
}

/// The fixed-order chain of guards, built once at startup and shared across
/// every host (guards read per-host configuration out of `ctx.host`).
pub struct DetectionPipeline {
    checkers: Vec<Box<dyn Checker>>,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self {
            checkers: vec![
                Box::new(allow_deny::AllowIpChecker),
                Box::new(allow_deny::AllowUrlChecker),
                Box::new(allow_deny::DenyIpChecker),
                Box::new(allow_deny::DenyUrlChecker),
                Box::new(bot::BotChecker::new()),
                Box::new(sqli::SqliChecker::new()),
                Box::new(xss::XssChecker::new()),
                Box::new(scanner::ScannerChecker::new()),
                Box::new(rce::RceChecker::new()),
                Box::new(cc::CcChecker::new()),
                Box::new(custom_rules::CustomRulesChecker),
                Box::new(sensitive::SensitiveChecker::new()),
            ],
        }
    }

    /// Run the full chain. Returns the first blocking result, or a pass once
    /// every guard has run (or a jump fired and ended evaluation early).
    pub fn evaluate(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guard_enabled {
            return DetectionResult::pass();
        }
        for checker in &self.checkers {
            let result = checker.check(ctx);
            if result.is_block {
                crate::observability::metrics::record_detection_result(
                    &ctx.host.code,
                    &result.rule_name,
                    true,
                );
                return result;
            }
            if result.jump_remaining_guards {
                return result;
            }
        }
        DetectionResult::pass()
    }
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}
