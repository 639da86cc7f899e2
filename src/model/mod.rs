//! Domain model shared across the routing table, detection pipeline, and
//! response rewriter: the per-host runtime snapshot (`HostSafe`), the
//! structured access-log record (`WebLog`), and the detection outcome type
//! (`DetectionResult`).

mod detection;
mod host;
mod weblog;

pub use detection::{DetectionResult, RuleMessageInfo};
pub use host::{
    AntiCcConfig, Backend, CustomRule, CustomRuleField, GuardConfig, HostBuildError, HostConfig,
    HostSafe, LdpRule, LoadBalanceStrategy, RuleAction, SiteStatus, TextMatchType, UrlRule,
};
pub use weblog::{Action, GuestRisk, WebLog};
