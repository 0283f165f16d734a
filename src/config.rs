/*!
 * Service configuration
 * Defaults, an optional config file and MOCK_* environment overrides, in that order
 */

use crate::delivery::{Destination, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the mock services binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Proxy ABIS behaviour
    #[serde(default)]
    pub abis: AbisConfig,

    /// Mock manual verification behaviour
    #[serde(default)]
    pub mv: MvConfig,

    /// Mock SBI capture profiles
    #[serde(default)]
    pub sbi: SbiConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    /// Upper bound for template fetches and callback deliveries
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Messages kept per outbound queue before the oldest is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            http_timeout_secs: default_http_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ServerConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbisConfig {
    /// Search the whole gallery for duplicates when no gallery is supplied
    #[serde(default = "default_true")]
    pub find_duplicate: bool,

    /// Always search for duplicates, regardless of `find_duplicate`
    #[serde(default)]
    pub force_duplicate: bool,

    /// Added to every delivery made from the message listener path
    #[serde(default)]
    pub response_delay_secs: u64,

    #[serde(default = "default_abis_queue")]
    pub outbound_queue: String,

    /// When set, responses are POSTed here instead of queued
    #[serde(default)]
    pub callback_url: Option<String>,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl Default for AbisConfig {
    fn default() -> Self {
        Self {
            find_duplicate: true,
            force_duplicate: false,
            response_delay_secs: 0,
            outbound_queue: default_abis_queue(),
            callback_url: None,
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl AbisConfig {
    pub fn destination(&self) -> Destination {
        destination_for(self.callback_url.as_deref(), &self.outbound_queue)
    }
}

/// Placeholder scores reported for every duplicate candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub confidence: u32,
    pub internal_score: u32,
    pub key1: String,
    pub key2: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            confidence: 70,
            internal_score: 56,
            key1: "value1".to_string(),
            key2: "value2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvConfig {
    /// Decision applied when no expectation overrides it (APPROVED / REJECTED)
    #[serde(default = "default_mv_decision")]
    pub default_decision: String,

    /// `id` stamped on every adjudication response
    #[serde(default = "default_mv_response_id")]
    pub response_id: String,

    #[serde(default = "default_mv_queue")]
    pub outbound_queue: String,

    #[serde(default)]
    pub callback_url: Option<String>,

    #[serde(default)]
    pub operators: OperatorConfig,
}

impl Default for MvConfig {
    fn default() -> Self {
        Self {
            default_decision: default_mv_decision(),
            response_id: default_mv_response_id(),
            outbound_queue: default_mv_queue(),
            callback_url: None,
            operators: OperatorConfig::default(),
        }
    }
}

impl MvConfig {
    pub fn destination(&self) -> Destination {
        destination_for(self.callback_url.as_deref(), &self.outbound_queue)
    }
}

/// Operator identities echoed in adjudication analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub primary_id: String,
    pub primary_comments: String,
    pub secondary_id: String,
    pub secondary_comments: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            primary_id: "110006".to_string(),
            primary_comments: "abcd".to_string(),
            secondary_id: "110005".to_string(),
            secondary_comments: "asbd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbiConfig {
    /// Root directory holding one sub-directory per capture profile
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,

    #[serde(default = "default_profile")]
    pub default_profile: String,
}

impl Default for SbiConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            default_profile: default_profile(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON formatted output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn destination_for(callback_url: Option<&str>, queue: &str) -> Destination {
    match callback_url {
        Some(url) if !url.trim().is_empty() => Destination::Callback(url.to_string()),
        _ => Destination::Queue(queue.to_string()),
    }
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_abis_queue() -> String {
    "abis-to-mosip".to_string()
}

fn default_mv_queue() -> String {
    "mv-to-mosip".to_string()
}

fn default_mv_decision() -> String {
    "APPROVED".to_string()
}

fn default_mv_response_id() -> String {
    "mosip.manual.adjudication.adjudicate".to_string()
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from("profile")
}

fn default_profile() -> String {
    "Default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// Environment keys use the `MOCK_` prefix and `__` between sections,
    /// e.g. `MOCK_ABIS__FIND_DUPLICATE=false`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&ServiceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MOCK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.server.queue_capacity, 10_000);
        assert!(config.abis.find_duplicate);
        assert!(!config.abis.force_duplicate);
        assert_eq!(config.mv.default_decision, "APPROVED");
        assert_eq!(config.sbi.default_profile, "Default");
    }

    #[test]
    fn test_destination_prefers_callback() {
        let mut abis = AbisConfig::default();
        assert_eq!(
            abis.destination(),
            Destination::Queue("abis-to-mosip".to_string())
        );

        abis.callback_url = Some("http://localhost:9000/abis".to_string());
        assert_eq!(
            abis.destination(),
            Destination::Callback("http://localhost:9000/abis".to_string())
        );

        abis.callback_url = Some("  ".to_string());
        assert!(matches!(abis.destination(), Destination::Queue(_)));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("mock-services-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("service.toml");
        std::fs::write(
            &path,
            "[mv]\ndefault_decision = \"REJECTED\"\n\n[abis]\nresponse_delay_secs = 3\n",
        )
        .unwrap();

        let config = ServiceConfig::load(path.to_str()).unwrap();
        assert_eq!(config.mv.default_decision, "REJECTED");
        assert_eq!(config.abis.response_delay_secs, 3);
        assert!(config.abis.find_duplicate);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
