use std::net::IpAddr;

use http::Uri;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// The text-matching mode shared by LDP masking rules, custom rules, and
/// allow/deny URL lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatchType {
    /// 等于匹配 - exact match.
    Equals,
    /// 前缀匹配 - prefix match.
    Prefix,
    /// 后缀匹配 - suffix match.
    Suffix,
    /// 包含匹配 - substring match.
    Contains,
}

impl TextMatchType {
    pub fn matches(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        match self {
            TextMatchType::Equals => haystack == needle,
            TextMatchType::Prefix => haystack.starts_with(needle),
            TextMatchType::Suffix => haystack.ends_with(needle),
            TextMatchType::Contains => haystack.contains(needle),
        }
    }
}

/// A URL match rule used by allow-list and deny-list guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlRule {
    pub match_type: TextMatchType,
    pub pattern: String,
}

/// One backend in a host's load-balanced upstream pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    /// Scheme + authority the request is proxied to, e.g. `http://10.0.0.5:8080`.
    pub url: String,
    /// Relative weight for weighted round robin. Ignored by other strategies.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl Backend {
    /// The backend's own remote address, when `url` names a literal IP
    /// rather than a DNS hostname. Used to detect a backend that points
    /// back at this engine's own listeners (upstream loop).
    pub fn remote_addr(&self) -> Option<(IpAddr, u16)> {
        let uri: Uri = self.url.parse().ok()?;
        let ip: IpAddr = uri.host()?.parse().ok()?;
        let port = uri
            .port_u16()
            .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 });
        Some((ip, port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    #[default]
    RoundRobin,
    Random,
    WeightedRoundRobin,
}

/// Which guards in the detection pipeline are active for a host.
///
/// Every field defaults to enabled; a host opts *out* of a guard rather than
/// opting in, matching the pipeline's fail-closed posture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default = "default_true")]
    pub bot: bool,
    #[serde(default = "default_true")]
    pub sqli: bool,
    #[serde(default = "default_true")]
    pub xss: bool,
    #[serde(default = "default_true")]
    pub scanner: bool,
    #[serde(default = "default_true")]
    pub rce: bool,
    #[serde(default = "default_true")]
    pub sensitive: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            bot: true,
            sqli: true,
            xss: true,
            scanner: true,
            rce: true,
            sensitive: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// CC (flood / rate-limit) guard configuration for a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AntiCcConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Sliding window length, seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Requests allowed per client IP within the window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// How long a client that exceeds the window is blocked for, seconds.
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,
}

impl Default for AntiCcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            block_secs: default_block_secs(),
        }
    }
}

fn default_window_secs() -> u64 {
    10
}

fn default_max_requests() -> u32 {
    200
}

fn default_block_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block,
    Allow,
}

/// A user-defined rule evaluated against one part of the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomRule {
    pub name: String,
    pub target: CustomRuleField,
    pub match_type: TextMatchType,
    pub pattern: String,
    pub action: RuleAction,
}

/// Where a custom rule looks for its pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum CustomRuleField {
    Uri,
    Query,
    Body,
    Header { name: String },
}

/// Local Data Privacy rule: decides *whether* a response gets masked, by
/// matching this host's (or the Global Host's) rule list against the
/// request URI. The first rule whose pattern matches wins; its
/// `mask_char`/`keep_prefix`/`keep_suffix` are then applied to every string
/// leaf of the (JSON) response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LdpRule {
    pub name: String,
    pub match_type: TextMatchType,
    pub pattern: String,
    /// Character used to replace masked content.
    #[serde(default = "default_mask_char")]
    pub mask_char: char,
    /// Characters kept unmasked at the start of a value.
    #[serde(default)]
    pub keep_prefix: usize,
    /// Characters kept unmasked at the end of a value.
    #[serde(default)]
    pub keep_suffix: usize,
}

fn default_mask_char() -> char {
    '*'
}

impl LdpRule {
    /// Whether this rule's pattern matches the request URI, i.e. whether it
    /// gates masking on for this request.
    pub fn matches_request_uri(&self, request_uri: &str) -> bool {
        self.match_type.matches(request_uri, &self.pattern)
    }

    /// Mask `value` unconditionally, per this rule's keep/mask parameters.
    pub fn mask(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len();
        let keep_prefix = self.keep_prefix.min(len);
        let keep_suffix = self.keep_suffix.min(len - keep_prefix);
        let masked_len = len - keep_prefix - keep_suffix;
        let mut out = String::with_capacity(len);
        out.extend(&chars[..keep_prefix]);
        out.extend(std::iter::repeat_n(self.mask_char, masked_len));
        out.extend(&chars[len - keep_suffix..]);
        out
    }
}

/// Whether a host currently accepts traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    #[default]
    Open,
    /// Site-closed short-circuit: every request is answered with a 503
    /// before any inspection or proxying.
    Closed,
}

/// Per-host bootstrap configuration as it appears in `[[hosts]]` TOML tables.
///
/// This is the serde-facing shape. `HostSafe::from_config` compiles it into
/// the runtime snapshot the routing table and detection pipeline consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Stable identifier for this host, independent of host name/port.
    pub code: String,
    /// `Host` header value(s) this entry answers to.
    pub host_names: Vec<String>,
    /// Port this host is scoped to. `None` matches any listener port.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub ssl_enabled: bool,
    #[serde(default)]
    pub cert_pem_path: Option<String>,
    #[serde(default)]
    pub key_pem_path: Option<String>,
    /// Whether this host is open for traffic or short-circuits every
    /// request with a 503.
    #[serde(default)]
    pub start_status: SiteStatus,
    /// Auto-redirect plain-HTTP requests to the HTTPS equivalent URL.
    /// Requires `ssl_enabled = true`.
    #[serde(default)]
    pub auto_jump_https: bool,
    /// Master switch for the whole detection pipeline. When `false`, every
    /// guard (allow/deny, signature checkers, CC, custom rules) is skipped
    /// and the request goes straight to the proxy stage.
    #[serde(default = "default_true")]
    pub guard_enabled: bool,
    /// URL prefixes excluded from the access log even when `log_type = all`.
    #[serde(default)]
    pub exclude_url_log: Vec<String>,
    /// Marks this entry as the Global Host, the sentinel used when no other
    /// host matches a request. At most one host may set this.
    #[serde(default)]
    pub global_host: bool,
    #[serde(default)]
    pub backends: Vec<Backend>,
    #[serde(default)]
    pub lb_strategy: LoadBalanceStrategy,
    #[serde(default)]
    pub allow_ip: Vec<String>,
    #[serde(default)]
    pub allow_url: Vec<UrlRule>,
    #[serde(default)]
    pub deny_ip: Vec<String>,
    #[serde(default)]
    pub deny_url: Vec<UrlRule>,
    #[serde(default)]
    pub guards: GuardConfig,
    #[serde(default)]
    pub anti_cc: AntiCcConfig,
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
    #[serde(default)]
    pub ldp_rules: Vec<LdpRule>,
    /// Accept requests on any port, ignoring `port`/listener scoping.
    #[serde(default)]
    pub unrestricted_port: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            code: String::new(),
            host_names: Vec::new(),
            port: None,
            ssl_enabled: false,
            cert_pem_path: None,
            key_pem_path: None,
            start_status: SiteStatus::Open,
            auto_jump_https: false,
            guard_enabled: true,
            exclude_url_log: Vec::new(),
            global_host: false,
            backends: Vec::new(),
            lb_strategy: LoadBalanceStrategy::default(),
            allow_ip: Vec::new(),
            allow_url: Vec::new(),
            deny_ip: Vec::new(),
            deny_url: Vec::new(),
            guards: GuardConfig::default(),
            anti_cc: AntiCcConfig::default(),
            custom_rules: Vec::new(),
            ldp_rules: Vec::new(),
            unrestricted_port: false,
        }
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("host code must not be empty".into());
        }
        if self.host_names.is_empty() {
            return Err(format!("host '{}' has no host_names", self.code));
        }
        if self.ssl_enabled && (self.cert_pem_path.is_none() || self.key_pem_path.is_none()) {
            return Err(format!(
                "host '{}' has ssl_enabled = true but is missing cert_pem_path/key_pem_path",
                self.code
            ));
        }
        if self.auto_jump_https && !self.ssl_enabled {
            return Err(format!(
                "host '{}' has auto_jump_https = true but ssl_enabled = false",
                self.code
            ));
        }
        Ok(())
    }
}

/// Compiled, immutable per-host runtime state.
///
/// Instances are held behind `Arc` and swapped atomically on reload so that
/// in-flight requests always see a consistent snapshot.
#[derive(Debug, Clone)]
pub struct HostSafe {
    pub code: String,
    pub host_names: Vec<String>,
    pub port: Option<u16>,
    pub ssl_enabled: bool,
    pub cert_pem_path: Option<String>,
    pub key_pem_path: Option<String>,
    pub start_status: SiteStatus,
    pub auto_jump_https: bool,
    pub guard_enabled: bool,
    pub exclude_url_log: Vec<String>,
    pub backends: Vec<Backend>,
    pub lb_strategy: LoadBalanceStrategy,
    pub allow_ip: Vec<IpNet>,
    pub allow_url: Vec<UrlRule>,
    pub deny_ip: Vec<IpNet>,
    pub deny_url: Vec<UrlRule>,
    pub guards: GuardConfig,
    pub anti_cc: AntiCcConfig,
    pub custom_rules: Vec<CustomRule>,
    pub ldp_rules: Vec<LdpRule>,
    pub unrestricted_port: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HostBuildError {
    #[error("host '{host}' has invalid CIDR/IP '{value}' in {list}: {source}")]
    InvalidIp {
        host: String,
        list: &'static str,
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}

impl HostSafe {
    pub fn from_config(config: &HostConfig) -> Result<Self, HostBuildError> {
        let allow_ip = parse_ip_list(&config.code, "allow_ip", &config.allow_ip)?;
        let deny_ip = parse_ip_list(&config.code, "deny_ip", &config.deny_ip)?;

        Ok(Self {
            code: config.code.clone(),
            host_names: config.host_names.clone(),
            port: config.port,
            ssl_enabled: config.ssl_enabled,
            cert_pem_path: config.cert_pem_path.clone(),
            key_pem_path: config.key_pem_path.clone(),
            start_status: config.start_status,
            auto_jump_https: config.auto_jump_https,
            guard_enabled: config.guard_enabled,
            exclude_url_log: config.exclude_url_log.clone(),
            backends: config.backends.clone(),
            lb_strategy: config.lb_strategy,
            allow_ip,
            allow_url: config.allow_url.clone(),
            deny_ip,
            deny_url: config.deny_url.clone(),
            guards: config.guards.clone(),
            anti_cc: config.anti_cc.clone(),
            custom_rules: config.custom_rules.clone(),
            ldp_rules: config.ldp_rules.clone(),
            unrestricted_port: config.unrestricted_port,
        })
    }

    /// Build the sentinel Global Host used when no configured host matches.
    pub fn global(global_host_name: &str) -> Self {
        Self {
            code: "_global_".to_string(),
            host_names: vec![global_host_name.to_string()],
            port: None,
            ssl_enabled: false,
            cert_pem_path: None,
            key_pem_path: None,
            start_status: SiteStatus::Open,
            auto_jump_https: false,
            guard_enabled: true,
            exclude_url_log: Vec::new(),
            backends: Vec::new(),
            lb_strategy: LoadBalanceStrategy::default(),
            allow_ip: Vec::new(),
            allow_url: Vec::new(),
            deny_ip: Vec::new(),
            deny_url: Vec::new(),
            guards: GuardConfig::default(),
            anti_cc: AntiCcConfig::default(),
            custom_rules: Vec::new(),
            ldp_rules: Vec::new(),
            unrestricted_port: true,
        }
    }

    pub fn is_ip_allowed(&self, ip: IpAddr) -> bool {
        self.allow_ip.iter().any(|net| net.contains(&ip))
    }

    pub fn is_ip_denied(&self, ip: IpAddr) -> bool {
        self.deny_ip.iter().any(|net| net.contains(&ip))
    }
}

fn parse_ip_list(
    host: &str,
    list: &'static str,
    values: &[String],
) -> Result<Vec<IpNet>, HostBuildError> {
    values
        .iter()
        .map(|v| {
            // Bare IPs are accepted as /32 (or /128) host routes.
            v.parse::<IpNet>()
                .or_else(|_| v.parse::<IpAddr>().map(IpNet::from))
                .map_err(|source| HostBuildError::InvalidIp {
                    host: host.to_string(),
                    list,
                    value: v.clone(),
                    source,
                })
        })
        .collect()
}
