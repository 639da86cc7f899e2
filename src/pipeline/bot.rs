use once_cell::sync::Lazy;

use crate::model::DetectionResult;

use super::{
    Checker, RequestContext,
    signatures::{Signature, SignatureSet},
};

/// Known HTTP libraries and headless-automation clients commonly used by
/// unwanted scrapers, distinct from the attack-tool signatures the scanner
/// guard looks for.
static SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::compile(&[
        Signature::new("bot-empty-ua", r"^$"),
        Signature::new("bot-curl", r"(?i)^curl/"),
        Signature::new("bot-python-requests", r"(?i)^python-requests/"),
        Signature::new("bot-go-http-client", r"(?i)^go-http-client/"),
        Signature::new("bot-headless-chrome", r"(?i)headlesschrome"),
        Signature::new("bot-phantomjs", r"(?i)phantomjs"),
        Signature::new("bot-scrapy", r"(?i)scrapy"),
        Signature::new("bot-generic-crawler", r"(?i)\b(bot|crawler|spider)\b"),
    ])
});

/// Bad-bot guard, matched against the `User-Agent` header.
///
/// Search-engine crawlers are not distinguished from scrapers here; hosts
/// that want to allow specific bots do so via an `AllowURL`/custom rule
/// exception evaluated earlier in the pipeline.
pub struct BotChecker;

impl BotChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for BotChecker {
    fn name(&self) -> &'static str {
        "bot"
    }

    fn check(&self, ctx: &RequestContext<'_>) -> DetectionResult {
        if !ctx.host.guards.bot {
            return DetectionResult::pass();
        }
        let ua = ctx.header_str("user-agent").unwrap_or("");
        if let Some(name) = SIGNATURES.first_match(ua) {
            return DetectionResult::block(
                name,
                "Bot Traffic Detected",
                format!("user-agent matched signature '{name}'"),
            );
        }
        DetectionResult::pass()
    }
}
