use crate::model::{CustomRuleField, DetectionResult, RuleAction};

use super::{Checker, RequestContext};

/// Evaluates a host's user-defined rules in declaration order. The first
/// matching `block` rule stops the request; a matching `allow` rule jumps,
/// same as the built-in allow-list guards.
pub struct CustomRulesChecker;

impl Checker for CustomRulesChecker {
    fn name(&self) -> &'static str {
        "custom-rules"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        for rule in &ctx.host.custom_rules {
            let Some(value) = field_value(ctx, &rule.target) else {
                continue;
            };
            if rule.match_type.matches(value, &rule.pattern) {
                return match rule.action {
                    RuleAction::Block => DetectionResult::block(
                        rule.name.clone(),
                        "Custom Rule Matched",
                        format!("rule '{}' matched {:?}", rule.name, rule.target),
                    ),
                    RuleAction::Allow => DetectionResult::jump(),
                };
            }
        }
        DetectionResult::pass()
    }
}

fn field_value<'a>(ctx: &'a RequestContext<'a>, field: &CustomRuleField) -> Option<&'a str> {
    match field {
        CustomRuleField::Uri => Some(ctx.uri_path),
        CustomRuleField::Query => Some(ctx.query),
        CustomRuleField::Body => ctx.body_peek,
        CustomRuleField::Header { name } => ctx.header_str(name),
    }
}

#[cfg(test)]
mod tests {
    use std::{net::IpAddr, sync::Arc};

    use http::{HeaderMap, Method};

    use super::*;
    use crate::model::{HostConfig, TextMatchType};

    #[test]
    fn blocks_on_matching_custom_rule() {
        let config = HostConfig {
            code: "h1".into(),
            host_names: vec!["example.com".into()],
            custom_rules: vec![crate::model::CustomRule {
                name: "block-admin-path".into(),
                target: CustomRuleField::Uri,
                match_type: TextMatchType::Prefix,
                pattern: "/internal".into(),
                action: RuleAction::Block,
            }],
            ..Default::default()
        };
        let host = Arc::new(crate::model::HostSafe::from_config(&config).unwrap());
        let headers = HeaderMap::new();
        let method = Method::GET;
        let ctx = RequestContext {
            host,
            client_ip: "203.0.113.9".parse::<IpAddr>().unwrap(),
            method: &method,
            uri_path: "/internal/status",
            query: "",
            headers: &headers,
            body_peek: None,
        };
        let result = CustomRulesChecker.check(&ctx);
        assert!(result.is_block);
        assert_eq!(result.rule_name, "block-admin-path");
    }
}
