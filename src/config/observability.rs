use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tracing configuration (OpenTelemetry).
    #[serde(default)]
    pub tracing: TracingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include file/line information.
    #[serde(default)]
    pub file_line: bool,

    /// Include span information for tracing integration.
    #[serde(default = "default_true")]
    pub include_spans: bool,

    /// Filter directives (e.g., "tower_http=debug,rampart::pipeline=trace").
    #[serde(default)]
    pub filter: Option<String>,

    /// SIEM-specific configuration (for CEF, LEEF, Syslog formats). Used when
    /// exporting access log records rather than plain tracing events.
    #[serde(default)]
    pub siem: SiemConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            file_line: false,
            include_spans: true,
            filter: None,
            siem: SiemConfig::default(),
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON format (for log aggregation).
    Json,
    /// CEF (Common Event Format) for ArcSight, Splunk, and most SIEMs.
    Cef,
    /// LEEF (Log Event Extended Format) for IBM QRadar.
    Leef,
    /// Syslog (RFC 5424) format for standard syslog servers.
    Syslog,
}

impl LogFormat {
    /// Returns true if this format is a SIEM format (CEF, LEEF, or Syslog).
    pub fn is_siem_format(&self) -> bool {
        matches!(self, LogFormat::Cef | LogFormat::Leef | LogFormat::Syslog)
    }
}

/// SIEM-specific configuration for CEF, LEEF, and Syslog formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiemConfig {
    /// Device vendor name for CEF/LEEF headers.
    #[serde(default = "default_device_vendor")]
    pub device_vendor: String,

    /// Device product name for CEF/LEEF headers.
    #[serde(default = "default_device_product")]
    pub device_product: String,

    /// Device version for CEF/LEEF headers.
    /// If not specified, uses the crate version from Cargo.toml.
    #[serde(default)]
    pub device_version: Option<String>,

    /// Syslog facility (only used for Syslog format).
    #[serde(default)]
    pub facility: SyslogFacility,

    /// Override hostname for Syslog/CEF/LEEF.
    /// If not specified, uses the system hostname.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Application name for Syslog APP-NAME field.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// LEEF format version (1.0 or 2.0).
    #[serde(default)]
    pub leef_version: LeefVersion,
}

impl Default for SiemConfig {
    fn default() -> Self {
        Self {
            device_vendor: default_device_vendor(),
            device_product: default_device_product(),
            device_version: None,
            facility: SyslogFacility::default(),
            hostname: None,
            app_name: default_app_name(),
            leef_version: LeefVersion::default(),
        }
    }
}

impl SiemConfig {
    /// Get the device version, falling back to the crate version.
    pub fn get_device_version(&self) -> &str {
        self.device_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }

    /// Get the hostname, falling back to the system hostname.
    pub fn get_hostname(&self) -> String {
        self.hostname.clone().unwrap_or_else(|| {
            #[cfg(feature = "otlp")]
            {
                hostname::get()
                    .map(|h| h.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "unknown".to_string())
            }
            #[cfg(not(feature = "otlp"))]
            {
                "unknown".to_string()
            }
        })
    }
}

fn default_device_vendor() -> String {
    "Rampart".to_string()
}

fn default_device_product() -> String {
    "WAF".to_string()
}

fn default_app_name() -> String {
    "rampart".to_string()
}

/// Syslog facility as defined in RFC 5424.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyslogFacility {
    /// Kernel messages (0).
    Kern,
    /// User-level messages (1).
    User,
    /// Mail system (2).
    Mail,
    /// System daemons (3).
    Daemon,
    /// Security/authorization messages (4).
    Auth,
    /// Messages generated internally by syslogd (5).
    Syslog,
    /// Line printer subsystem (6).
    Lpr,
    /// Network news subsystem (7).
    News,
    /// UUCP subsystem (8).
    Uucp,
    /// Clock daemon (9).
    Cron,
    /// Security/authorization messages (private) (10).
    Authpriv,
    /// FTP daemon (11).
    Ftp,
    /// NTP subsystem (12).
    Ntp,
    /// Log audit (13).
    Audit,
    /// Log alert (14).
    Alert,
    /// Clock daemon (15).
    Clock,
    /// Local use 0 (16).
    #[default]
    Local0,
    /// Local use 1 (17).
    Local1,
    /// Local use 2 (18).
    Local2,
    /// Local use 3 (19).
    Local3,
    /// Local use 4 (20).
    Local4,
    /// Local use 5 (21).
    Local5,
    /// Local use 6 (22).
    Local6,
    /// Local use 7 (23).
    Local7,
}

impl SyslogFacility {
    /// Returns the numeric facility code (0-23).
    pub fn code(&self) -> u8 {
        match self {
            SyslogFacility::Kern => 0,
            SyslogFacility::User => 1,
            SyslogFacility::Mail => 2,
            SyslogFacility::Daemon => 3,
            SyslogFacility::Auth => 4,
            SyslogFacility::Syslog => 5,
            SyslogFacility::Lpr => 6,
            SyslogFacility::News => 7,
            SyslogFacility::Uucp => 8,
            SyslogFacility::Cron => 9,
            SyslogFacility::Authpriv => 10,
            SyslogFacility::Ftp => 11,
            SyslogFacility::Ntp => 12,
            SyslogFacility::Audit => 13,
            SyslogFacility::Alert => 14,
            SyslogFacility::Clock => 15,
            SyslogFacility::Local0 => 16,
            SyslogFacility::Local1 => 17,
            SyslogFacility::Local2 => 18,
            SyslogFacility::Local3 => 19,
            SyslogFacility::Local4 => 20,
            SyslogFacility::Local5 => 21,
            SyslogFacility::Local6 => 22,
            SyslogFacility::Local7 => 23,
        }
    }
}

/// LEEF format version.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeefVersion {
    /// LEEF version 1.0 (original format).
    #[serde(rename = "1.0")]
    V1,
    /// LEEF version 2.0 (with delimiter specification).
    #[default]
    #[serde(rename = "2.0")]
    V2,
}

impl LeefVersion {
    /// Returns the version string for the LEEF header.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeefVersion::V1 => "1.0",
            LeefVersion::V2 => "2.0",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// Enable distributed tracing.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP exporter configuration.
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,

    /// Service name.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Service version.
    #[serde(default)]
    pub service_version: Option<String>,

    /// Environment (e.g., "production", "staging").
    #[serde(default)]
    pub environment: Option<String>,

    /// Sampling configuration.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Additional resource attributes.
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,

    /// Propagation format.
    #[serde(default)]
    pub propagation: PropagationFormat,
}

fn default_service_name() -> String {
    "rampart".to_string()
}

/// OTLP exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    /// OTLP endpoint URL.
    pub endpoint: String,

    /// Protocol (grpc or http).
    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Headers to include (e.g., for authentication).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Timeout in seconds.
    #[serde(default = "default_otlp_timeout")]
    pub timeout_secs: u64,

    /// Enable compression.
    #[serde(default = "default_true")]
    pub compression: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

fn default_otlp_timeout() -> u64 {
    10
}

/// Sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    /// Sampling strategy.
    #[serde(default)]
    pub strategy: SamplingStrategy,

    /// Sample rate for ratio-based sampling (0.0-1.0).
    #[serde(default = "default_sample_rate")]
    pub rate: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            rate: default_sample_rate(),
        }
    }
}

fn default_sample_rate() -> f64 {
    1.0 // Sample everything
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Sample all traces.
    #[default]
    AlwaysOn,
    /// Sample no traces.
    AlwaysOff,
    /// Sample a percentage of traces.
    Ratio,
    /// Parent-based sampling (inherit from parent span).
    ParentBased,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationFormat {
    /// W3C Trace Context.
    #[default]
    TraceContext,
    /// B3 (Zipkin).
    B3,
    /// Jaeger.
    Jaeger,
    /// Multiple formats.
    Multi,
}

// ─────────────────────────────────────────────────────────────────────────────
// Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Enable metrics gathering.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus endpoint configuration.
    #[serde(default)]
    pub prometheus: Option<PrometheusConfig>,

    /// OTLP metrics exporter.
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,

    /// Histogram buckets for upstream latency metrics (in milliseconds).
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets_ms: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus: None,
            otlp: None,
            latency_buckets_ms: default_latency_buckets(),
        }
    }
}

fn default_latency_buckets() -> Vec<f64> {
    vec![
        10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
    ]
}

/// Prometheus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Enable Prometheus endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path for the metrics endpoint.
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Include default process metrics.
    #[serde(default = "default_true")]
    pub process_metrics: bool,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}
