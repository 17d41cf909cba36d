use arc_swap::ArcSwap;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::file_search::{ClientSettings, PollOptions};

/// Environment variable prefix, e.g. `FILE_SEARCH__SERVER__PORT=9000`
const ENV_PREFIX: &str = "FILE_SEARCH";

/// Fallback variables for the API key, checked in order
const API_KEY_ENV_FALLBACKS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_GENERATIVE_AI_API_KEY"];

// ==================== Static Configuration (startup-only) ====================

/// Static configuration that cannot be changed at runtime
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Upstream API endpoints. The API key is sent to these hosts, so they
/// are only read from file/env at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
        }
    }
}

/// Secrets. Never exposed through the settings API.
#[derive(Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ==================== Dynamic Configuration (hot-reloadable) ====================

/// Dynamic configuration that can be updated at runtime via API
/// DB values override config file/env defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub operations: OperationsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub stores: StoresConfig,

    #[serde(default)]
    pub tool: ToolConfig,
}

/// Upstream request behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Upload operation polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationsConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Poll uploads in the background and keep their final state
    #[serde(default = "default_true")]
    pub track_uploads: bool,
}

impl OperationsConfig {
    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            track_uploads: true,
        }
    }
}

/// Size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_size_bytes: default_max_upload_size(),
        }
    }
}

/// Store management behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    /// Default for `force` when deleting stores and documents
    #[serde(default = "default_true")]
    pub force_delete: bool,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self { force_delete: true }
    }
}

/// Chat tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Model that runs the grounded search
    #[serde(default = "default_tool_model")]
    pub model: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            model: default_tool_model(),
            enabled: true,
        }
    }
}

// ==================== DynamicConfig Settings Keys ====================

/// All valid setting keys for DynamicConfig
pub const VALID_SETTING_KEYS: &[&str] = &[
    "gemini.request_timeout_secs",
    "operations.poll_interval_ms",
    "operations.poll_timeout_secs",
    "operations.track_uploads",
    "limits.max_upload_size_bytes",
    "stores.force_delete",
    "tool.model",
    "tool.enabled",
];

impl DynamicConfig {
    /// Get all valid setting keys
    pub fn valid_keys() -> HashSet<&'static str> {
        VALID_SETTING_KEYS.iter().copied().collect()
    }

    /// Convert config to key-value map for API response
    pub fn to_key_value_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        map.insert(
            "gemini.request_timeout_secs".to_string(),
            serde_json::json!(self.gemini.request_timeout_secs),
        );

        map.insert(
            "operations.poll_interval_ms".to_string(),
            serde_json::json!(self.operations.poll_interval_ms),
        );
        map.insert(
            "operations.poll_timeout_secs".to_string(),
            serde_json::json!(self.operations.poll_timeout_secs),
        );
        map.insert(
            "operations.track_uploads".to_string(),
            serde_json::json!(self.operations.track_uploads),
        );

        map.insert(
            "limits.max_upload_size_bytes".to_string(),
            serde_json::json!(self.limits.max_upload_size_bytes),
        );

        map.insert(
            "stores.force_delete".to_string(),
            serde_json::json!(self.stores.force_delete),
        );

        map.insert(
            "tool.model".to_string(),
            serde_json::Value::String(self.tool.model.clone()),
        );
        map.insert(
            "tool.enabled".to_string(),
            serde_json::json!(self.tool.enabled),
        );

        map
    }

    /// Apply DB settings as overrides to this config
    pub fn merge_from_db(&mut self, db_settings: &HashMap<String, serde_json::Value>) {
        for (key, value) in db_settings {
            if !self.apply_setting(key, value) {
                tracing::warn!(key = %key, value = %value, "Ignoring invalid stored setting");
            }
        }
    }

    /// Apply a single setting value. Returns false when the key is unknown
    /// or the value has the wrong type.
    pub fn apply_setting(&mut self, key: &str, value: &serde_json::Value) -> bool {
        match key {
            "gemini.request_timeout_secs" => {
                set_positive(&mut self.gemini.request_timeout_secs, value)
            }
            "operations.poll_interval_ms" => {
                set_positive(&mut self.operations.poll_interval_ms, value)
            }
            "operations.poll_timeout_secs" => {
                set_positive(&mut self.operations.poll_timeout_secs, value)
            }
            "operations.track_uploads" => set_bool(&mut self.operations.track_uploads, value),
            "limits.max_upload_size_bytes" => {
                set_positive(&mut self.limits.max_upload_size_bytes, value)
            }
            "stores.force_delete" => set_bool(&mut self.stores.force_delete, value),
            "tool.model" => match value.as_str().filter(|v| !v.trim().is_empty()) {
                Some(v) => {
                    self.tool.model = v.trim().to_string();
                    true
                }
                None => false,
            },
            "tool.enabled" => set_bool(&mut self.tool.enabled, value),
            _ => false,
        }
    }
}

fn set_positive(target: &mut u64, value: &serde_json::Value) -> bool {
    match value.as_u64() {
        Some(v) if v > 0 => {
            *target = v;
            true
        }
        _ => false,
    }
}

fn set_bool(target: &mut bool, value: &serde_json::Value) -> bool {
    match value.as_bool() {
        Some(v) => {
            *target = v;
            true
        }
        None => false,
    }
}

// ==================== RuntimeConfig (combines static + dynamic) ====================

/// Runtime configuration manager
/// Combines static config (startup-only) with dynamic config (hot-reloadable via ArcSwap)
pub struct RuntimeConfig {
    /// Static configuration (never changes after startup)
    pub static_config: StaticConfig,
    /// File/env values that DB overrides are applied on top of
    defaults: DynamicConfig,
    /// Dynamic configuration (can be hot-reloaded)
    dynamic: ArcSwap<DynamicConfig>,
}

impl RuntimeConfig {
    pub fn new(static_config: StaticConfig, dynamic: DynamicConfig) -> Self {
        Self {
            static_config,
            defaults: dynamic.clone(),
            dynamic: ArcSwap::from_pointee(dynamic),
        }
    }

    /// Get current dynamic config snapshot (lock-free read)
    pub fn dynamic(&self) -> arc_swap::Guard<Arc<DynamicConfig>> {
        self.dynamic.load()
    }

    /// Update dynamic config (atomic swap)
    pub fn update_dynamic(&self, new_config: DynamicConfig) {
        self.dynamic.store(Arc::new(new_config));
    }

    /// Load config from all sources with DB overrides
    pub fn load(static_config: StaticConfig, db: &Database) -> ServiceResult<Self> {
        let config = Self::new(static_config, load_dynamic_config()?);
        config.reload_from_db(db)?;
        Ok(config)
    }

    /// Rebuild dynamic config from file/env defaults + DB and swap atomically
    pub fn reload_from_db(&self, db: &Database) -> ServiceResult<()> {
        let mut dynamic = self.defaults.clone();
        let db_settings = db.get_all_settings()?;
        dynamic.merge_from_db(&db_settings);
        self.update_dynamic(dynamic);
        Ok(())
    }

    /// The configured API key, if any
    pub fn api_key(&self) -> Option<String> {
        self.static_config.credentials.api_key.clone()
    }

    /// Settings for building the upstream client from the current snapshot
    pub fn client_settings(&self) -> ClientSettings {
        let upstream = &self.static_config.upstream;
        ClientSettings {
            api_base_url: upstream.api_base_url.clone(),
            upload_base_url: upstream.upload_base_url.clone(),
            api_key: self.api_key(),
            timeout: Duration::from_secs(self.dynamic().gemini.request_timeout_secs),
        }
    }
}

// ==================== Config Loading Functions ====================

fn builder() -> ServiceResult<Config> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })
}

/// Load static configuration from file and env vars
pub fn load_static_config() -> ServiceResult<StaticConfig> {
    let mut static_config: StaticConfig =
        builder()?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize static config: {}", e),
            })?;

    if static_config
        .credentials
        .api_key
        .as_deref()
        .is_none_or(|k| k.trim().is_empty())
    {
        static_config.credentials.api_key = API_KEY_ENV_FALLBACKS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()));
    }

    Ok(static_config)
}

/// Load dynamic configuration from file and env vars (without DB overrides)
fn load_dynamic_config() -> ServiceResult<DynamicConfig> {
    builder()?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize dynamic config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_upload_base_url() -> String {
    "https://generativelanguage.googleapis.com/upload/v1beta".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_timeout_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_upload_size() -> u64 {
    104_857_600 // 100MB
}

fn default_tool_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_contract() {
        assert_eq!(
            StaticConfig::default().upstream.api_base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );

        let config = DynamicConfig::default();
        assert_eq!(config.limits.max_upload_size_bytes, 100 * 1024 * 1024);
        assert_eq!(
            config.operations.poll_options(),
            PollOptions {
                interval: Duration::from_millis(2000),
                timeout: Duration::from_secs(300),
            }
        );
        assert!(config.stores.force_delete);
    }

    #[test]
    fn every_valid_key_is_reported() {
        let map = DynamicConfig::default().to_key_value_map();
        for key in VALID_SETTING_KEYS {
            assert!(map.contains_key(*key), "missing {key}");
        }
        assert_eq!(map.len(), VALID_SETTING_KEYS.len());
    }

    #[test]
    fn merge_applies_typed_overrides_only() {
        let mut config = DynamicConfig::default();
        let overrides = HashMap::from([
            ("operations.poll_interval_ms".to_string(), serde_json::json!(500)),
            ("tool.model".to_string(), serde_json::json!("gemini-2.5-flash")),
            ("stores.force_delete".to_string(), serde_json::json!("yes")),
            ("limits.max_upload_size_bytes".to_string(), serde_json::json!(0)),
        ]);

        config.merge_from_db(&overrides);

        assert_eq!(config.operations.poll_interval_ms, 500);
        assert_eq!(config.tool.model, "gemini-2.5-flash");
        assert!(config.stores.force_delete);
        assert_eq!(config.limits.max_upload_size_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn upstream_urls_are_not_runtime_settings() {
        let mut config = DynamicConfig::default();
        for key in ["gemini.api_base_url", "gemini.upload_base_url"] {
            assert!(!DynamicConfig::valid_keys().contains(key));
            assert!(!config.apply_setting(key, &serde_json::json!("http://attacker.test")));
            assert!(!config.to_key_value_map().contains_key(key));
        }

        let runtime = RuntimeConfig::new(StaticConfig::default(), config);
        assert_eq!(
            runtime.client_settings().api_base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn reload_applies_overrides_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();

        let mut defaults = DynamicConfig::default();
        defaults.tool.model = "base-model".to_string();
        let config = RuntimeConfig::new(StaticConfig::default(), defaults);

        db.set_settings(HashMap::from([(
            "tool.enabled".to_string(),
            serde_json::json!(false),
        )]))
        .unwrap();
        config.reload_from_db(&db).unwrap();
        assert!(!config.dynamic().tool.enabled);
        assert_eq!(config.dynamic().tool.model, "base-model");

        db.set_settings(HashMap::from([(
            "tool.enabled".to_string(),
            serde_json::Value::Null,
        )]))
        .unwrap();
        config.reload_from_db(&db).unwrap();
        assert!(config.dynamic().tool.enabled);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let credentials = CredentialsConfig {
            api_key: Some("super-secret".to_string()),
        };
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }
}
