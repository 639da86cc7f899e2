use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final disposition recorded for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// 通过 - passed with no guard engaged.
    Pass,
    /// 放行 - explicitly allow-listed.
    Release,
    /// 阻止 - blocked by a detection guard.
    Block,
    /// 禁止 - forbidden (e.g. IP deny-list, no matching host).
    Forbid,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Pass => "通过",
            Action::Release => "放行",
            Action::Block => "阻止",
            Action::Forbid => "禁止",
        }
    }
}

/// Risk classification attached to the requesting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestRisk {
    /// 正常访客 - ordinary visitor.
    Normal,
    /// 可疑用户 - suspicious user (matched a non-blocking heuristic).
    Suspicious,
    /// 未解析域名 - host header did not resolve to any configured host.
    UnresolvedHost,
}

/// Structured access-log record for one request, the unit written to the
/// event queue and any SIEM export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub host_code: String,
    pub host_name: String,
    pub client_ip: IpAddr,
    pub method: String,
    pub uri: String,
    pub status: u16,
    pub action: Action,
    pub guest_risk: GuestRisk,
    pub rule_name: Option<String>,
    pub title: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub request_body_excerpt: Option<String>,
    pub response_body_excerpt: Option<String>,
    pub duration_ms: u64,
    pub country: Option<String>,
    pub tenant_id: Option<String>,
    pub user_code: Option<String>,
}

impl WebLog {
    /// Truncate the body excerpts to the configured record limits and strip
    /// anything that looks like it belongs to an LDP-masked field, so a log
    /// sink never re-leaks what the response rewriter just redacted.
    pub fn truncate_bodies(&mut self, max_request_len: usize, max_response_len: usize) {
        if let Some(body) = &mut self.request_body_excerpt
            && body.len() > max_request_len
        {
            body.truncate(max_request_len);
            body.push_str("...[truncated]");
        }
        if let Some(body) = &mut self.response_body_excerpt
            && body.len() > max_response_len
        {
            body.truncate(max_response_len);
            body.push_str("...[truncated]");
        }
    }
}
