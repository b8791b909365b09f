//! Connection and process configuration.
//!
//! Callers may describe the instances to inspect in three ways: the name of
//! an environment variable, an explicit list, or a raw instance-list string.
//! [`ConnectionSource::resolve`] turns all of them into `Vec<ConnectionConfig>`
//! before any adapter sees them.
//!
//! The instance-list grammar (used by `REDIS_INSTANCES`) is
//! `name:host:port[:password]`, comma separated. Everything after the third
//! colon is the password, so passwords may contain colons.

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable holding the default instance list.
pub const DEFAULT_INSTANCES_VAR: &str = "REDIS_INSTANCES";

pub const DEFAULT_REDIS_PORT: u16 = 6379;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while resolving which instances to inspect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Nothing to inspect; reported to HTTP callers as `not_configured`.
    #[error("no Redis instances configured ({source_hint})")]
    NotConfigured { source_hint: String },

    /// `index` is the 1-based position in the comma-separated list; the
    /// entry text is never echoed since it may hold a password.
    #[error("invalid instance entry #{index}: {reason}")]
    InvalidInstance { index: usize, reason: String },

    /// Requests may only name instance-list variables.
    #[error("environment variable '{0}' is not an instance list")]
    EnvVarNotAllowed(String),

    #[error("duplicate instance name '{0}'")]
    DuplicateInstance(String),
}

impl ConfigError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::NotConfigured { .. } => "not_configured",
            ConfigError::InvalidInstance { .. } => "invalid_instance",
            ConfigError::EnvVarNotAllowed(_) => "env_var_not_allowed",
            ConfigError::DuplicateInstance(_) => "duplicate_instance",
        }
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// One addressable Redis instance holding BullMQ queues.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Display key, unique per provider type
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<i64>,
    /// BullMQ key prefix; `bull` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_REDIS_PORT
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            password: None,
            db: None,
            prefix: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = (!password.is_empty()).then_some(password);
        self
    }
}

// Passwords stay out of logs and panics.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Parses a comma-separated `name:host:port[:password]` list.
///
/// Blank segments are ignored, so an empty string yields an empty list.
pub fn parse_instance_list(raw: &str) -> Result<Vec<ConnectionConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, entry)| !entry.is_empty())
        .map(|(position, entry)| parse_instance(position + 1, entry))
        .collect()
}

fn parse_instance(index: usize, entry: &str) -> Result<ConnectionConfig, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidInstance {
        index,
        reason: reason.to_string(),
    };

    let mut parts = entry.splitn(4, ':');
    let name = parts.next().map(str::trim).unwrap_or_default();
    let host = parts.next().map(str::trim).unwrap_or_default();
    let port = parts.next().map(str::trim).unwrap_or_default();
    let password = parts.next();

    if name.is_empty() {
        return Err(invalid("missing name"));
    }
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

    let config = ConnectionConfig::new(name, host, port);
    Ok(match password {
        Some(password) => config.with_password(password),
        None => config,
    })
}

// ============================================================================
// ConnectionSource
// ============================================================================

/// Where the instances for one request come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    /// Read an instance list from this environment variable
    Env { var: String },
    /// Explicit instances
    Instances(Vec<ConnectionConfig>),
    /// Raw instance-list string in the `REDIS_INSTANCES` grammar
    Legacy(String),
}

impl ConnectionSource {
    pub fn env_default() -> Self {
        ConnectionSource::Env {
            var: DEFAULT_INSTANCES_VAR.to_string(),
        }
    }

    /// Resolves to a non-empty list of uniquely named instances.
    pub fn resolve(&self) -> Result<Vec<ConnectionConfig>, ConfigError> {
        let configs = match self {
            ConnectionSource::Env { var } => match env::var(var) {
                Ok(raw) => parse_instance_list(&raw)?,
                Err(_) => Vec::new(),
            },
            ConnectionSource::Instances(configs) => configs.clone(),
            ConnectionSource::Legacy(raw) => parse_instance_list(raw)?,
        };

        if configs.is_empty() {
            return Err(ConfigError::NotConfigured {
                source_hint: self.describe(),
            });
        }

        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.name.as_str()) {
                return Err(ConfigError::DuplicateInstance(config.name.clone()));
            }
        }

        Ok(configs)
    }

    fn describe(&self) -> String {
        match self {
            ConnectionSource::Env { var } => format!("environment variable {} is unset or empty", var),
            ConnectionSource::Instances(_) => "request listed no instances".to_string(),
            ConnectionSource::Legacy(_) => "instance string is empty".to_string(),
        }
    }
}

// ============================================================================
// Timeouts / Settings
// ============================================================================

/// Deadlines applied to every backend connection. There is no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    pub connect: Duration,
    pub command: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            command: Duration::from_secs(10),
        }
    }
}

/// Process-level settings for the server binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// Variable consulted when a request names no instances
    pub instances_var: String,
    pub timeouts: ConnectionTimeouts,
    pub scan_count: usize,
    /// JSON query library; the embedded one is used when absent
    pub query_library: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            instances_var: DEFAULT_INSTANCES_VAR.to_string(),
            timeouts: ConnectionTimeouts::default(),
            scan_count: crate::backend::bullmq::DEFAULT_SCAN_COUNT,
            query_library: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("QUEUE_LENS_ADDR", defaults.bind_addr),
            instances_var: env::var("QUEUE_LENS_INSTANCES_VAR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.instances_var),
            timeouts: ConnectionTimeouts {
                connect: Duration::from_secs(env_parse_nonzero(
                    "QUEUE_LENS_CONNECT_TIMEOUT_SECS",
                    defaults.timeouts.connect.as_secs(),
                )),
                command: Duration::from_secs(env_parse_nonzero(
                    "QUEUE_LENS_COMMAND_TIMEOUT_SECS",
                    defaults.timeouts.command.as_secs(),
                )),
            },
            scan_count: env_parse_nonzero("QUEUE_LENS_SCAN_COUNT", defaults.scan_count as u64)
                as usize,
            query_library: env::var("QUEUE_LENS_QUERY_LIBRARY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn instance_source(&self) -> ConnectionSource {
        ConnectionSource::Env {
            var: self.instances_var.clone(),
        }
    }

    /// Source for a caller-named variable, or the configured one when
    /// `var` is absent. Only instance-list variables may be named: the
    /// configured one, `REDIS_INSTANCES`, or any `*_INSTANCES`.
    pub fn env_source(&self, var: Option<String>) -> Result<ConnectionSource, ConfigError> {
        let Some(var) = var.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
            return Ok(self.instance_source());
        };
        if self.allows_instances_var(&var) {
            Ok(ConnectionSource::Env { var })
        } else {
            warn!(var = %var, "request named a non-instance environment variable");
            Err(ConfigError::EnvVarNotAllowed(var))
        }
    }

    pub fn allows_instances_var(&self, var: &str) -> bool {
        var == self.instances_var || var == DEFAULT_INSTANCES_VAR || var.ends_with("_INSTANCES")
    }
}

/// Like [`env_parse`], but zero also falls back to the default.
fn env_parse_nonzero(var: &str, default: u64) -> u64 {
    match env_parse(var, default) {
        0 => {
            warn!(var = %var, default, "setting must be positive, using default");
            default
        }
        value => value,
    }
}

fn env_parse<T: std::str::FromStr + std::fmt::Debug>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = %var, value = %raw, default = ?default, "unparseable setting, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instance_list() {
        let configs =
            parse_instance_list("main:10.0.0.1:6379, cache:redis.local:6380:s3cr:et ,").unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "main");
        assert_eq!(configs[0].host, "10.0.0.1");
        assert_eq!(configs[0].port, 6379);
        assert!(configs[0].password.is_none());
        assert_eq!(configs[1].port, 6380);
        assert_eq!(configs[1].password.as_deref(), Some("s3cr:et"));
    }

    #[test]
    fn test_parse_instance_list_empty_is_not_an_error() {
        assert!(parse_instance_list("").unwrap().is_empty());
        assert!(parse_instance_list(" , ,").unwrap().is_empty());
    }

    #[test]
    fn test_parse_instance_rejects_bad_entries() {
        let err = parse_instance_list("main:host:notaport").unwrap_err();
        assert_eq!(err.code(), "invalid_instance");
        assert!(parse_instance_list("main").is_err());
        assert!(parse_instance_list(":host:6379").is_err());

        let err = parse_instance_list("main:host:99999:hunter2").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_invalid_entry_text_never_echoed() {
        let err = parse_instance_list("ok:h:1, ,sk_live_TOPSECRET").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidInstance {
                index: 3,
                reason: "missing host".to_string()
            }
        );
        assert!(!err.to_string().contains("sk_live"));
    }

    #[test]
    fn test_env_source_allows_only_instance_lists() {
        let settings = Settings {
            instances_var: "MY_REDIS".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.env_source(None).unwrap(), settings.instance_source());
        assert_eq!(settings.env_source(Some("  ".to_string())).unwrap(), settings.instance_source());
        for allowed in ["MY_REDIS", "REDIS_INSTANCES", "STAGING_INSTANCES"] {
            assert_eq!(
                settings.env_source(Some(allowed.to_string())).unwrap(),
                ConnectionSource::Env {
                    var: allowed.to_string()
                }
            );
        }
        for denied in ["PATH", "AWS_SECRET_ACCESS_KEY", "INSTANCES_TOKEN"] {
            let err = settings.env_source(Some(denied.to_string())).unwrap_err();
            assert_eq!(err.code(), "env_var_not_allowed");
        }
    }

    #[test]
    fn test_zero_settings_fall_back_to_default() {
        std::env::set_var("QUEUE_LENS_TEST_ZERO_SETTING", "0");
        std::env::set_var("QUEUE_LENS_TEST_POSITIVE_SETTING", "7");
        assert_eq!(env_parse_nonzero("QUEUE_LENS_TEST_ZERO_SETTING", 5), 5);
        assert_eq!(env_parse_nonzero("QUEUE_LENS_TEST_POSITIVE_SETTING", 5), 7);
        assert_eq!(env_parse_nonzero("QUEUE_LENS_TEST_UNSET_SETTING", 10), 10);
    }

    #[test]
    fn test_empty_password_is_none() {
        let configs = parse_instance_list("main:host:6379:").unwrap();
        assert!(configs[0].password.is_none());
    }

    #[test]
    fn test_unset_env_var_resolves_to_not_configured() {
        let source = ConnectionSource::Env {
            var: "QUEUE_LENS_TEST_VAR_THAT_IS_NEVER_SET".to_string(),
        };
        let err = source.resolve().unwrap_err();
        assert_eq!(err.code(), "not_configured");
        assert!(err.to_string().contains("no Redis instances configured"));
    }

    #[test]
    fn test_legacy_and_direct_sources() {
        let legacy = ConnectionSource::Legacy("a:h1:1,b:h2:2".to_string());
        let resolved = legacy.resolve().unwrap();
        assert_eq!(resolved.len(), 2);

        let direct = ConnectionSource::Instances(resolved.clone());
        assert_eq!(direct.resolve().unwrap(), resolved);

        assert_eq!(
            ConnectionSource::Instances(Vec::new()).resolve().unwrap_err().code(),
            "not_configured"
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let source = ConnectionSource::Legacy("a:h1:1,a:h2:2".to_string());
        assert_eq!(
            source.resolve().unwrap_err(),
            ConfigError::DuplicateInstance("a".to_string())
        );
    }

    #[test]
    fn test_connection_config_serde() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"name":"main","host":"localhost","password":"pw"}"#).unwrap();
        assert_eq!(config.port, DEFAULT_REDIS_PORT);
        assert_eq!(config.password.as_deref(), Some("pw"));

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("password").is_none());
        assert!(!format!("{:?}", config).contains("pw\""));
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = ConnectionTimeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(5));
        assert_eq!(timeouts.command, Duration::from_secs(10));
    }
}
