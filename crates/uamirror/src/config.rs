// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.
//!
//! [`MirrorConfig`] gathers everything the facade needs: endpoint and
//! identity, cache file location, the fixed subscription QoS and the uniform
//! sampling policy of monitored items. It can be built in code through
//! [`MirrorConfigBuilder`] or loaded from a YAML, TOML or JSON file with
//! [`ConfigLoader`].
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse according to the file extension
//! 3. Apply `UAMIRROR_*` environment overrides
//! 4. Validate
//!
//! # Example
//!
//! ```
//! use uamirror::config::MirrorConfig;
//!
//! let config = MirrorConfig::builder()
//!     .endpoint("opc.tcp://plc-01:4840")
//!     .cache_directory("/var/lib/uamirror")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.cache.file_name, "address_space.json");
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, MirrorError, MirrorResult};
use crate::session::{Credentials, TimestampsToReturn};
use crate::types::NodeId;

// =============================================================================
// MirrorConfig
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Server endpoint URL (`opc.tcp://host:port/path`).
    pub endpoint: String,

    /// Session identity.
    #[serde(default)]
    pub credentials: Credentials,

    /// Cache file location.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Subscription QoS.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// Sampling policy applied to every monitored item.
    #[serde(default)]
    pub monitoring: MonitoredItemSettings,

    /// Browse roots.
    #[serde(default)]
    pub browse: BrowseSettings,

    /// Event bus sizing.
    #[serde(default)]
    pub events: EventSettings,
}

impl MirrorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MirrorResult<()> {
        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(ConfigurationError::invalid_value(
                "endpoint",
                "must start with 'opc.tcp://'",
            )
            .into());
        }
        if let Credentials::UserName { username, .. } = &self.credentials {
            if username.is_empty() {
                return Err(
                    ConfigurationError::invalid_value("credentials.username", "must not be empty")
                        .into(),
                );
            }
        }
        self.cache.validate()?;
        self.subscription.validate()?;
        self.monitoring.validate()?;
        if self.events.capacity == 0 {
            return Err(
                ConfigurationError::invalid_value("events.capacity", "must be greater than 0")
                    .into(),
            );
        }
        Ok(())
    }
}

// =============================================================================
// CacheSettings
// =============================================================================

/// Location of the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory holding the cache file, created if missing.
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    /// Cache file name.
    #[serde(default = "default_cache_file_name")]
    pub file_name: String,
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_cache_file_name() -> String {
    "address_space.json".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            file_name: default_cache_file_name(),
        }
    }
}

impl CacheSettings {
    /// Creates settings for a directory with the default file name.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Full path of the cache file.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn validate(&self) -> MirrorResult<()> {
        if self.file_name.trim().is_empty() {
            return Err(
                ConfigurationError::invalid_value("cache.file_name", "must not be empty").into(),
            );
        }
        if Path::new(&self.file_name).components().count() != 1 {
            return Err(ConfigurationError::invalid_value(
                "cache.file_name",
                "must be a plain file name",
            )
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// Fixed QoS of the monitoring subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Publishing interval.
    #[serde(default = "default_publishing_interval")]
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Lifetime count (publishing intervals before the subscription expires).
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority.
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Publishing enabled.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

fn default_priority() -> u8 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: 0,
            priority: default_priority(),
            publishing_enabled: true,
        }
    }
}

impl SubscriptionSettings {
    /// Validates the QoS parameters.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.publishing_interval.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "subscription.publishing_interval",
                "must be greater than 0",
            )
            .into());
        }
        if self.keepalive_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "subscription.keepalive_count",
                "must be greater than 0",
            )
            .into());
        }
        if self.lifetime_count < self.keepalive_count.saturating_mul(3) {
            return Err(ConfigurationError::invalid_value(
                "subscription.lifetime_count",
                format!(
                    "must be at least 3 x keepalive_count ({})",
                    self.keepalive_count.saturating_mul(3)
                ),
            )
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// MonitoredItemSettings
// =============================================================================

/// Sampling policy applied uniformly to every monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemSettings {
    /// Sampling interval.
    #[serde(default = "default_sampling_interval")]
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size per item.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Discard the oldest queued value on overflow.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Timestamps returned with notifications.
    #[serde(default)]
    pub timestamps: TimestampsToReturn,
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_queue_size() -> u32 {
    10
}

impl Default for MonitoredItemSettings {
    fn default() -> Self {
        Self {
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
            timestamps: TimestampsToReturn::Both,
        }
    }
}

impl MonitoredItemSettings {
    /// Validates the sampling policy.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.queue_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "monitoring.queue_size",
                "must be greater than 0",
            )
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// BrowseSettings / EventSettings
// =============================================================================

/// Roots browsed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseSettings {
    /// Nodes the traversal starts from.
    #[serde(default = "default_roots")]
    pub roots: Vec<NodeId>,

    /// Register newly discovered variables for monitoring.
    #[serde(default = "default_true")]
    pub monitor_new_items: bool,
}

fn default_roots() -> Vec<NodeId> {
    vec![NodeId::objects_folder()]
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            monitor_new_items: true,
        }
    }
}

/// Event bus sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    /// Events buffered per subscriber before the oldest are dropped.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// MirrorConfigBuilder
// =============================================================================

/// Builder for [`MirrorConfig`].
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    endpoint: Option<String>,
    credentials: Credentials,
    cache: CacheSettings,
    subscription: SubscriptionSettings,
    monitoring: MonitoredItemSettings,
    browse: BrowseSettings,
    events: EventSettings,
}

impl MirrorConfigBuilder {
    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets user name credentials.
    pub fn user_name(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials::UserName {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Sets the cache directory.
    pub fn cache_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache.directory = directory.into();
        self
    }

    /// Sets the cache file name.
    pub fn cache_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.cache.file_name = file_name.into();
        self
    }

    /// Sets the subscription QoS.
    pub fn subscription(mut self, settings: SubscriptionSettings) -> Self {
        self.subscription = settings;
        self
    }

    /// Sets the publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.subscription.publishing_interval = interval;
        self
    }

    /// Sets the monitored item sampling policy.
    pub fn monitoring(mut self, settings: MonitoredItemSettings) -> Self {
        self.monitoring = settings;
        self
    }

    /// Replaces the browse roots.
    pub fn roots(mut self, roots: impl IntoIterator<Item = NodeId>) -> Self {
        self.browse.roots = roots.into_iter().collect();
        self
    }

    /// Sets whether browsing registers new variables for monitoring.
    pub fn monitor_new_items(mut self, enabled: bool) -> Self {
        self.browse.monitor_new_items = enabled;
        self
    }

    /// Sets the event bus capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.events.capacity = capacity;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> MirrorResult<MirrorConfig> {
        let endpoint = self.endpoint.ok_or_else(|| {
            MirrorError::from(ConfigurationError::invalid_value("endpoint", "is required"))
        })?;

        let config = MirrorConfig {
            endpoint,
            credentials: self.credentials,
            cache: self.cache,
            subscription: self.subscription,
            monitoring: self.monitoring,
            browse: self.browse,
            events: self.events,
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> MirrorResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(ConfigurationError::UnsupportedFormat {
                extension: other.to_string(),
            }
            .into()),
            None => Err(ConfigurationError::UnsupportedFormat {
                extension: "(no extension)".to_string(),
            }
            .into()),
        }
    }
}

/// Loads [`MirrorConfig`] from files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with the `UAMIRROR` prefix.
    pub fn new() -> Self {
        Self {
            env_prefix: "UAMIRROR".to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholder resolution and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file, choosing the format by extension.
    pub fn load(&self, path: impl AsRef<Path>) -> MirrorResult<MirrorConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = self.load_from_str(&content, ConfigFormat::from_path(path)?)?;
        debug!(
            endpoint = %config.endpoint,
            roots = config.browse.roots.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> MirrorResult<MirrorConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: MirrorConfig = parse_str(&content, format)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut MirrorConfig) {
        if let Ok(value) = env::var(format!("{}_ENDPOINT", self.env_prefix)) {
            config.endpoint = value;
        }
        if let Ok(value) = env::var(format!("{}_CACHE_DIR", self.env_prefix)) {
            config.cache.directory = PathBuf::from(value);
        }
        if let Ok(value) = env::var(format!("{}_CACHE_FILE", self.env_prefix)) {
            config.cache.file_name = value;
        }
    }
}

/// Loads configuration from a file with the default loader.
pub fn load_config(path: impl AsRef<Path>) -> MirrorResult<MirrorConfig> {
    ConfigLoader::new().load(path)
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> MirrorResult<T> {
    match format {
        ConfigFormat::Yaml => {
            let source = ::config::Config::builder()
                .add_source(::config::File::from_str(content, ::config::FileFormat::Yaml))
                .build()
                .map_err(|e| ConfigurationError::parse(e.to_string()))?;
            source
                .try_deserialize()
                .map_err(|e| ConfigurationError::parse(e.to_string()).into())
        }
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigurationError::parse(e.to_string()).into())
        }
        ConfigFormat::Json => serde_json::from_str(content)
            .map_err(|e| ConfigurationError::parse(e.to_string()).into()),
    }
}

/// Resolves `${VAR}` and `${VAR:default}` placeholders.
///
/// Unknown variables without a default are left in place.
fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!("Environment variable '{}' not found", name);
                result.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = MirrorConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .build()
            .unwrap();

        assert_eq!(config.credentials, Credentials::Anonymous);
        assert_eq!(config.cache.path(), PathBuf::from("./cache/address_space.json"));
        assert_eq!(config.subscription.publishing_interval, Duration::from_secs(1));
        assert_eq!(config.monitoring.queue_size, 10);
        assert!(config.monitoring.discard_oldest);
        assert_eq!(config.browse.roots, vec![NodeId::objects_folder()]);
        assert_eq!(config.events.capacity, 1024);
    }

    #[test]
    fn test_builder_requires_endpoint() {
        assert!(MirrorConfig::builder().build().is_err());
        assert!(MirrorConfig::builder().endpoint("http://x").build().is_err());
    }

    #[test]
    fn test_subscription_validation() {
        let mut settings = SubscriptionSettings::default();
        assert!(settings.validate().is_ok());

        settings.lifetime_count = 20;
        assert!(settings.validate().is_err());

        settings = SubscriptionSettings {
            publishing_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cache_file_name_validation() {
        let result = MirrorConfig::builder()
            .endpoint("opc.tcp://localhost:4840")
            .cache_file_name("nested/cache.json")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.TOML")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_load_toml() {
        let content = r#"
endpoint = "opc.tcp://plc-01:4840"

[cache]
directory = "/tmp/mirror"

[subscription]
publishing_interval = "500ms"

[monitoring]
sampling_interval = "100ms"
queue_size = 5

[browse]
roots = ["ns=2;s=Line1", "i=85"]
monitor_new_items = false
"#;
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(content, ConfigFormat::Toml)
            .unwrap();

        assert_eq!(config.endpoint, "opc.tcp://plc-01:4840");
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/mirror"));
        assert_eq!(config.cache.file_name, "address_space.json");
        assert_eq!(config.subscription.publishing_interval, Duration::from_millis(500));
        assert_eq!(config.monitoring.sampling_interval, Duration::from_millis(100));
        assert_eq!(config.browse.roots[0], NodeId::string(2, "Line1"));
        assert!(!config.browse.monitor_new_items);
    }

    #[test]
    fn test_load_json() {
        let content = r#"{
            "endpoint": "opc.tcp://plc-02:4840",
            "credentials": {"type": "user_name", "username": "operator", "password": "secret"}
        }"#;
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(content, ConfigFormat::Json)
            .unwrap();
        assert!(matches!(config.credentials, Credentials::UserName { .. }));
    }

    #[test]
    fn test_load_rejects_invalid() {
        let result = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str("endpoint = \"tcp://wrong\"", ConfigFormat::Toml);
        assert!(result.is_err());

        let result = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str("endpoint = ", ConfigFormat::Toml);
        assert!(matches!(
            result,
            Err(MirrorError::Configuration(ConfigurationError::Parse { .. }))
        ));
    }

    #[test]
    fn test_placeholder_defaults() {
        let resolved = resolve_env_placeholders(
            "endpoint: ${UAMIRROR_TEST_SURELY_UNSET_VAR:opc.tcp://fallback:4840}",
        );
        assert_eq!(resolved, "endpoint: opc.tcp://fallback:4840");

        let untouched = resolve_env_placeholders("a ${UAMIRROR_TEST_SURELY_UNSET_VAR} b");
        assert_eq!(untouched, "a ${UAMIRROR_TEST_SURELY_UNSET_VAR} b");

        assert_eq!(resolve_env_placeholders("open ${brace"), "open ${brace");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigLoader::new().load("/nonexistent/uamirror.yaml");
        assert!(matches!(
            result,
            Err(MirrorError::Configuration(ConfigurationError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uamirror.yaml");
        fs::write(
            &path,
            "endpoint: opc.tcp://plc-03:4840\ncache:\n  file_name: plant.json\n",
        )
        .unwrap();

        let config = ConfigLoader::new().with_env_vars(false).load(&path).unwrap();
        assert_eq!(config.endpoint, "opc.tcp://plc-03:4840");
        assert_eq!(config.cache.file_name, "plant.json");
    }
}
