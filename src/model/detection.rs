use serde::{Deserialize, Serialize};

/// Outcome of a single detection-pipeline guard.
///
/// The pipeline stops at the first guard that reports `is_block`, and
/// `jump_remaining_guards` lets an allow-list guard short-circuit everything
/// after it (the AllowIP/AllowURL "jump" in the ordered pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_block: bool,
    pub jump_remaining_guards: bool,
    pub title: String,
    pub content: String,
    pub rule_name: String,
}

impl DetectionResult {
    pub fn pass() -> Self {
        Self {
            is_block: false,
            jump_remaining_guards: false,
            title: String::new(),
            content: String::new(),
            rule_name: String::new(),
        }
    }

    pub fn jump() -> Self {
        Self {
            is_block: false,
            jump_remaining_guards: true,
            title: String::new(),
            content: String::new(),
            rule_name: String::new(),
        }
    }

    pub fn block(
        rule_name: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            is_block: true,
            jump_remaining_guards: false,
            title: title.into(),
            content: content.into(),
            rule_name: rule_name.into(),
        }
    }
}

/// Detail of a matched rule, carried into the access log and any exported
/// SIEM event, independent of whether the request was ultimately blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMessageInfo {
    pub rule_name: String,
    pub title: String,
    pub content: String,
    pub host_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_is_not_a_block_and_does_not_jump() {
        let result = DetectionResult::pass();
        assert!(!result.is_block);
        assert!(!result.jump_remaining_guards);
    }

    #[test]
    fn jump_is_not_a_block_but_skips_remaining_guards() {
        let result = DetectionResult::jump();
        assert!(!result.is_block);
        assert!(result.jump_remaining_guards);
    }

    #[test]
    fn block_carries_rule_identity() {
        let result = DetectionResult::block("sqli-001", "SQL Injection", "matched ' OR 1=1");
        assert!(result.is_block);
        assert_eq!(result.rule_name, "sqli-001");
    }
}
