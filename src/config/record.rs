use serde::{Deserialize, Serialize};

/// Global request-handling knobs, named after the `RECORD_*` environment
/// variables they are conventionally supplied through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordConfig {
    /// Ordered list of trusted forwarded-for header names (`RECORD_PROXY_HEADER`).
    ///
    /// Checked in order; the first present header wins. Only consulted when
    /// `server.trusted_proxies` accepts the connecting peer.
    #[serde(default)]
    pub proxy_headers: Vec<String>,

    /// Maximum request body size recorded/inspected, in bytes (`RECORD_MAX_BODY_LENGTH`).
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,

    /// Maximum response body size recorded/inspected, in bytes (`RECORD_MAX_RES_BODY_LENGTH`).
    #[serde(default = "default_max_res_body_length")]
    pub max_res_body_length: usize,

    /// HTTP status code used for the plain-HTTP to HTTPS auto-jump redirect
    /// (`RECORD_REDIRECT_HTTPS_CODE`).
    #[serde(default = "default_redirect_https_code")]
    pub redirect_https_code: u16,

    /// Whether response bodies are captured in the access log (`RECORD_RESP`).
    #[serde(default)]
    pub record_resp: bool,

    /// Which requests produce an access-log entry (`RUNTIME_RECORD_LOG_TYPE`).
    #[serde(default)]
    pub log_type: LogType,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            proxy_headers: Vec::new(),
            max_body_length: default_max_body_length(),
            max_res_body_length: default_max_res_body_length(),
            redirect_https_code: default_redirect_https_code(),
            record_resp: false,
            log_type: LogType::default(),
        }
    }
}

fn default_max_body_length() -> usize {
    1024 * 1024
}

fn default_max_res_body_length() -> usize {
    1024 * 1024
}

fn default_redirect_https_code() -> u16 {
    308
}

/// Which requests get an access-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    /// Log every request.
    #[default]
    All,
    /// Only log requests the detection pipeline blocked or flagged.
    AbnormalOnly,
}

/// Identity of the Global Host: the sentinel `HostSafe` used when no
/// host-specific entry matches the request's `Host` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalHostConfig {
    /// Host name the Global Host answers to (`GLOBAL_HOST_NAME`).
    #[serde(default = "default_global_host_name")]
    pub global_host_name: String,

    /// `Server` response header override for unmatched requests (`CUSTOM_SERVER_NAME`).
    #[serde(default)]
    pub custom_server_name: Option<String>,

    /// Deployment/operator identifier attached to exported logs (`USER_CODE`).
    #[serde(default)]
    pub user_code: Option<String>,

    /// Tenant identifier attached to exported logs (`TENANT_ID`).
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Default for GlobalHostConfig {
    fn default() -> Self {
        Self {
            global_host_name: default_global_host_name(),
            custom_server_name: None,
            user_code: None,
            tenant_id: None,
        }
    }
}

fn default_global_host_name() -> String {
    "_global_".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_redirect_code_is_permanent_redirect() {
        assert_eq!(RecordConfig::default().redirect_https_code, 308);
    }

    #[test]
    fn default_log_type_is_all() {
        assert_eq!(RecordConfig::default().log_type, LogType::All);
    }

    #[test]
    fn default_global_host_name_is_sentinel() {
        assert_eq!(GlobalHostConfig::default().global_host_name, "_global_");
    }
}
