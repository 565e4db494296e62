//! Configuration for the rail gateway
//!
//! Every provider receives a flat key/value [`ProviderConfig`]. Missing keys fall back to
//! sandbox defaults; a sandbox provider without `base_url` uses the in-process sandbox
//! transport and never reaches a real endpoint.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Rail endpoint base URL
pub const BASE_URL: &str = "base_url";
/// API key / bearer token
pub const API_KEY: &str = "api_key";
/// Shared signing secret
pub const SECRET_KEY: &str = "secret_key";
/// `sandbox` or `production`
pub const ENVIRONMENT: &str = "environment";
/// Outbound timeout in seconds
pub const TIMEOUT_SECONDS: &str = "timeout_seconds";
/// Originator institution code (domestic rail)
pub const ORGANIZATION_CODE: &str = "organization_code";
/// Merchant identifier (SEPA processor)
pub const MERCHANT_ID: &str = "merchant_id";
/// Partner identifier (Interac)
pub const PARTNER_ID: &str = "partner_id";

const KNOWN_KEYS: &[&str] = &[
    BASE_URL,
    API_KEY,
    SECRET_KEY,
    ENVIRONMENT,
    TIMEOUT_SECONDS,
    ORGANIZATION_CODE,
    MERCHANT_ID,
    PARTNER_ID,
];

/// Provider environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test rails
    Sandbox,
    /// Live rails
    Production,
}

/// Flat key/value provider configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderConfig {
    #[serde(deserialize_with = "scalar_values")]
    values: BTreeMap<String, String>,
}

/// A config value as written in TOML; numbers and flags are kept as their text
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl From<ScalarValue> for String {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Text(text) => text,
            ScalarValue::Integer(n) => n.to_string(),
            ScalarValue::Float(n) => n.to_string(),
            ScalarValue::Flag(flag) => flag.to_string(),
        }
    }
}

fn scalar_values<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, ScalarValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(key, value)| (key, value.into())).collect())
}

impl ProviderConfig {
    /// Empty config (all sandbox defaults)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a key in place
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Value for `key` or `default`
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Rail base URL, if configured
    pub fn base_url(&self) -> Option<&str> {
        self.get(BASE_URL)
    }

    /// Environment, defaulting to sandbox
    pub fn environment(&self) -> Result<Environment> {
        match self.get(ENVIRONMENT).map(|v| v.to_ascii_lowercase()) {
            None => Ok(Environment::Sandbox),
            Some(v) if v == "sandbox" || v == "test" => Ok(Environment::Sandbox),
            Some(v) if v == "production" || v == "live" => Ok(Environment::Production),
            Some(v) => Err(Error::Config(format!("unknown environment: {}", v))),
        }
    }

    /// Outbound timeout
    pub fn timeout(&self) -> Result<Duration> {
        match self.get(TIMEOUT_SECONDS) {
            None => Ok(Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECONDS)),
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| Error::Config(format!("invalid timeout_seconds: {}", raw))),
        }
    }

    /// Number of keys set
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no key is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if key.contains("secret") || key.contains("key") {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// Gateway configuration
///
/// Keys missing from a config file take their [`Default`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Rail used when a request carries no routing hint
    pub default_provider: String,

    /// Emit JSON log lines
    pub json_logs: bool,

    /// Per-provider configuration, keyed by provider name
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let providers = crate::providers::PROVIDER_NAMES
            .iter()
            .map(|name| (name.to_string(), ProviderConfig::new()))
            .collect();

        Self {
            service_name: "payment-rails".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            default_provider: crate::providers::NIBSS.to_string(),
            json_logs: false,
            providers,
        }
    }
}

impl GatewayConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    ///
    /// Each provider reads `<NAME>_<KEY>`, e.g. `NIBSS_BASE_URL`, `SEPA_ENVIRONMENT`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = GatewayConfig::default();

        if let Some(provider) = lookup("RAILS_DEFAULT_PROVIDER") {
            config.default_provider = provider.to_ascii_lowercase();
        }

        if let Some(flag) = lookup("RAILS_LOG_JSON") {
            config.json_logs = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        for (name, provider_config) in config.providers.iter_mut() {
            let prefix = name.to_ascii_uppercase();
            for key in KNOWN_KEYS {
                let var = format!("{}_{}", prefix, key.to_ascii_uppercase());
                if let Some(value) = lookup(&var) {
                    provider_config.set(key, value);
                }
            }
        }

        config
    }

    /// Config for one provider (empty when absent)
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}
