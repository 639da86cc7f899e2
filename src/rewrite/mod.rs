//! Response rewriting: LDP masking of sensitive fields in a proxied
//! response, applied after decompressing the upstream body and before
//! re-compressing it for the client.

mod charset;
mod compression;
mod content_type;

pub use compression::ContentEncoding;
pub use content_type::{classify, ContentCategory};

use bytes::Bytes;

use crate::model::HostSafe;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Compression(#[from] compression::CompressionError),
}

pub struct RewriteOutcome {
    pub body: Bytes,
    pub masked: bool,
    /// Plain-text excerpt suitable for the access log, only populated for
    /// loggable content categories.
    pub loggable_excerpt: Option<String>,
}

/// Applies a host's LDP rules to a proxied response body.
pub struct ResponseRewriter {
    max_logged_body_len: usize,
}

impl ResponseRewriter {
    pub fn new(max_logged_body_len: usize) -> Self {
        Self { max_logged_body_len }
    }

    /// `request_uri` (path + query) gates whether this response is masked at
    /// all: the host's own `ldp_rules` are checked first, then the Global
    /// Host's, in list order; the first rule whose pattern matches wins and
    /// supplies the mask parameters applied to every string leaf.
    pub fn rewrite(
        &self,
        host: &HostSafe,
        global_host: &HostSafe,
        request_uri: &str,
        content_type: Option<&str>,
        content_encoding: Option<&str>,
        body: Bytes,
    ) -> Result<RewriteOutcome, RewriteError> {
        let category = classify(content_type);
        let encoding = ContentEncoding::from_header(content_encoding);
        let matching_rule = find_matching_ldp_rule(host, global_host, request_uri);

        if !category.is_maskable() || matching_rule.is_none() {
            let excerpt = if category.is_loggable() {
                let plain = compression::decode(encoding, &body)?;
                Some(truncate(&charset::decode_text(&plain), self.max_logged_body_len))
            } else {
                None
            };
            return Ok(RewriteOutcome {
                body,
                masked: false,
                loggable_excerpt: excerpt,
            });
        }
        let rule = matching_rule.expect("checked above");

        let plain = compression::decode(encoding, &body)?;
        let text = charset::decode_text(&plain);

        let (rewritten, masked) = if category == ContentCategory::Json {
            mask_json(&text, rule)
        } else {
            (text.clone(), false)
        };

        let excerpt = Some(truncate(&rewritten, self.max_logged_body_len));
        let out_body = if masked {
            compression::encode(encoding, rewritten.as_bytes())?
        } else {
            body
        };

        crate::observability::metrics::record_response_rewrite(
            &host.code,
            masked,
            encoding != ContentEncoding::Identity,
        );

        Ok(RewriteOutcome {
            body: out_body,
            masked,
            loggable_excerpt: excerpt,
        })
    }
}

/// First LDP rule (host's list, then the Global Host's) whose pattern
/// matches the request URI.
fn find_matching_ldp_rule<'a>(
    host: &'a HostSafe,
    global_host: &'a HostSafe,
    request_uri: &str,
) -> Option<&'a crate::model::LdpRule> {
    host.ldp_rules
        .iter()
        .find(|rule| rule.matches_request_uri(request_uri))
        .or_else(|| {
            global_host
                .ldp_rules
                .iter()
                .find(|rule| rule.matches_request_uri(request_uri))
        })
}

/// Walks a JSON document's string leaves and masks every one with `rule`.
/// Non-JSON bodies are not masked: the de-identification transform only
/// understands structured leaf values.
fn mask_json(text: &str, rule: &crate::model::LdpRule) -> (String, bool) {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(text) else {
        return (text.to_string(), false);
    };
    let mut masked = false;
    mask_value(&mut value, rule, &mut masked);
    match serde_json::to_string(&value) {
        Ok(rewritten) if masked => (rewritten, true),
        _ => (text.to_string(), false),
    }
}

fn mask_value(value: &mut serde_json::Value, rule: &crate::model::LdpRule, masked: &mut bool) {
    match value {
        serde_json::Value::String(s) => {
            *s = rule.mask(s);
            *masked = true;
        }
        serde_json::Value::Array(items) => {
            for item in items {
                mask_value(item, rule, masked);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                mask_value(v, rule, masked);
            }
        }
        _ => {}
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HostConfig, LdpRule, TextMatchType};

    fn host_with_ldp(rule: LdpRule) -> HostSafe {
        let config = HostConfig {
            code: "h1".into(),
            host_names: vec!["example.com".into()],
            ldp_rules: vec![rule],
            ..Default::default()
        };
        HostSafe::from_config(&config).unwrap()
    }

    fn host_without_ldp() -> HostSafe {
        let config = HostConfig {
            code: "_global_".into(),
            host_names: vec!["_global_".into()],
            ..Default::default()
        };
        HostSafe::from_config(&config).unwrap()
    }

    fn profile_rule() -> LdpRule {
        LdpRule {
            name: "profile".into(),
            match_type: TextMatchType::Prefix,
            pattern: "/api/profile".into(),
            mask_char: '*',
            keep_prefix: 3,
            keep_suffix: 4,
        }
    }

    #[test]
    fn masks_every_leaf_when_request_uri_matches_host_rule() {
        let host = host_with_ldp(profile_rule());
        let global = host_without_ldp();
        let rewriter = ResponseRewriter::new(8192);
        let body = Bytes::from(r#"{"phone":"13812345678","name":"alice"}"#);
        let outcome = rewriter
            .rewrite(&host, &global, "/api/profile/13812345678", Some("application/json"), None, body)
            .unwrap();
        assert!(outcome.masked);
        let text = String::from_utf8(outcome.body.to_vec()).unwrap();
        assert!(text.contains("138****5678"));
    }

    #[test]
    fn falls_back_to_global_host_ldp_rules() {
        let host = host_without_ldp();
        let global = host_with_ldp(profile_rule());
        let rewriter = ResponseRewriter::new(8192);
        let body = Bytes::from(r#"{"phone":"13812345678"}"#);
        let outcome = rewriter
            .rewrite(&host, &global, "/api/profile/13812345678", Some("application/json"), None, body)
            .unwrap();
        assert!(outcome.masked);
        let text = String::from_utf8(outcome.body.to_vec()).unwrap();
        assert!(text.contains("138****5678"));
    }

    #[test]
    fn host_rules_are_checked_before_global_rules() {
        let non_masking = LdpRule {
            name: "no-op".into(),
            match_type: TextMatchType::Prefix,
            pattern: "/api/profile".into(),
            mask_char: '*',
            keep_prefix: 99,
            keep_suffix: 99,
        };
        let host = host_with_ldp(non_masking);
        let global = host_with_ldp(profile_rule());
        let rewriter = ResponseRewriter::new(8192);
        let body = Bytes::from(r#"{"phone":"13812345678"}"#);
        let outcome = rewriter
            .rewrite(&host, &global, "/api/profile/13812345678", Some("application/json"), None, body)
            .unwrap();
        assert!(outcome.masked);
        let text = String::from_utf8(outcome.body.to_vec()).unwrap();
        assert!(text.contains("13812345678"), "host's own (non-redacting) rule should win over the global one");
    }

    #[test]
    fn image_responses_are_never_masked_or_logged() {
        let host = host_with_ldp(profile_rule());
        let global = host_without_ldp();
        let rewriter = ResponseRewriter::new(8192);
        let body = Bytes::from_static(b"\x89PNG\r\n");
        let outcome = rewriter
            .rewrite(&host, &global, "/api/profile/pic.png", Some("image/png"), None, body.clone())
            .unwrap();
        assert!(!outcome.masked);
        assert!(outcome.loggable_excerpt.is_none());
        assert_eq!(outcome.body, body);
    }

    #[test]
    fn request_uri_not_matching_any_rule_passes_through_unmasked() {
        let host = host_with_ldp(profile_rule());
        let global = host_without_ldp();
        let rewriter = ResponseRewriter::new(8192);
        let body = Bytes::from(r#"{"phone":"15912345678"}"#);
        let outcome = rewriter
            .rewrite(&host, &global, "/other/path", Some("application/json"), None, body.clone())
            .unwrap();
        assert!(!outcome.masked);
        assert_eq!(outcome.body, body);
    }
}
