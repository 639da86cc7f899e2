//! Configuration module for the engine.
//!
//! The engine is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//!
//! [record]
//! proxy_headers = ["X-Forwarded-For"]
//! ```

mod observability;
mod record;
mod server;

use std::path::Path;

pub use observability::*;
pub use record::*;
use serde::{Deserialize, Serialize};
pub use server::*;

use crate::model::HostConfig;

/// Root configuration for the engine.
///
/// All sections are optional with sensible defaults; a config with no
/// `[[hosts]]` entries still starts, it just has nothing to route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Listener and upstream-client configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Global request-handling knobs (`RECORD_*` settings).
    #[serde(default)]
    pub record: RecordConfig,

    /// Global Host identity, used when no host-specific match is found.
    #[serde(default)]
    pub global_host: GlobalHostConfig,

    /// Observability configuration (logging, tracing, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Statically configured hosts. In deployments backed by a database or
    /// control-plane API, this list seeds the initial `HostRepository` load
    /// and is otherwise empty.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let mut config: EngineConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.record.proxy_headers.is_empty() && self.server.trusted_proxies.is_configured() {
            return Err(ConfigError::Validation(
                "server.trusted_proxies is configured but record.proxy_headers is empty; \
                 no forwarded-for header would ever be consulted"
                    .into(),
            ));
        }

        let mut seen_codes = std::collections::HashSet::new();
        let mut global_host_code: Option<String> = None;
        for host in &self.hosts {
            if !seen_codes.insert(host.code.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate host code '{}' in [[hosts]]",
                    host.code
                )));
            }
            host.validate().map_err(ConfigError::Validation)?;
            if host.global_host {
                if let Some(first) = &global_host_code {
                    return Err(ConfigError::Validation(format!(
                        "hosts '{first}' and '{}' both set global_host = true; only one host may be the Global Host",
                        host.code
                    )));
                }
                global_host_code = Some(host.code.clone());
            }
        }

        Ok(())
    }

    /// True when no hosts are statically configured (relies entirely on a
    /// runtime `HostRepository` to supply hosts after start).
    pub fn is_empty_bootstrap(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Check for feature-gated configuration values before typed deserialization,
/// so a disabled optional feature produces an actionable error instead of a
/// cryptic serde "unknown variant" message.
fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let mut issues: Vec<(String, &str)> = Vec::new();

    if raw
        .get("observability")
        .and_then(|v| v.get("metrics"))
        .and_then(|v| v.get("prometheus"))
        .and_then(|v| v.get("enabled"))
        .and_then(|v| v.as_bool())
        == Some(true)
    {
        #[cfg(not(feature = "prometheus"))]
        issues.push((
            "observability.metrics.prometheus.enabled requires the 'prometheus' feature".into(),
            "prometheus",
        ));
    }

    if raw
        .get("observability")
        .and_then(|v| v.get("tracing"))
        .and_then(|v| v.get("otlp"))
        .is_some()
    {
        #[cfg(not(feature = "otlp"))]
        issues.push((
            "observability.tracing.otlp requires the 'otlp' feature".into(),
            "otlp",
        ));
    }

    if issues.is_empty() {
        return Ok(());
    }

    let details = issues
        .iter()
        .map(|(msg, _)| msg.as_str())
        .collect::<Vec<_>>()
        .join("\n  - ");
    let features = issues
        .iter()
        .map(|(_, feat)| *feat)
        .collect::<Vec<_>>()
        .join(",");

    Err(ConfigError::Validation(format!(
        "configuration requires features not compiled in this build:\n  \
         - {details}\n\n\
         rebuild with: cargo build --features {features}"
    )))
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (anything after a `#` on the same line).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let match_start = cap.get(0).unwrap().start();

            if let Some(pos) = comment_pos
                && match_start >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..match_start]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = cap.get(0).unwrap().end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = EngineConfig::from_str("").unwrap();
        assert!(config.is_empty_bootstrap());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: test-only, single-threaded access to this var name.
        unsafe { std::env::set_var("RAMPART_TEST_KEY", "secret") };
        let result = expand_env_vars("key = \"${RAMPART_TEST_KEY}\"").unwrap();
        assert_eq!(result, "key = \"secret\"");
        unsafe { std::env::remove_var("RAMPART_TEST_KEY") };
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# key = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# key = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_duplicate_host_code_rejected() {
        let toml = r#"
            [[hosts]]
            code = "dup"
            host_name = "a.example.com"

            [[hosts]]
            code = "dup"
            host_name = "b.example.com"
        "#;
        let err = EngineConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("duplicate host code"));
    }

    #[test]
    fn test_duplicate_global_host_rejected() {
        let toml = r#"
            [[hosts]]
            code = "g1"
            host_names = ["a.example.com"]
            global_host = true

            [[hosts]]
            code = "g2"
            host_names = ["b.example.com"]
            global_host = true
        "#;
        let err = EngineConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("global_host"));
    }

    #[test]
    fn test_trusted_proxies_without_record_headers_rejected() {
        let toml = r#"
            [server.trusted_proxies]
            cidrs = ["10.0.0.0/8"]
        "#;
        let err = EngineConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("proxy_headers"));
    }
}
