//! Global configuration types for Memora.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! session thresholds, the optional text-generation provider, and where the
//! backup passphrase comes from.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.memora/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub session: SessionConfig,

    /// Remote text-generation provider. When absent, summaries and memory
    /// extraction run in rule-based mode only.
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    #[serde(default)]
    pub backup: BackupConfig,
}

/// Conversation size thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hard threshold: at this many messages the next send rolls over.
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,

    /// Fraction of `max_messages` at which the warning state begins.
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
}

fn default_max_messages() -> u32 {
    100
}

fn default_warning_ratio() -> f64 {
    0.8
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            warning_ratio: default_warning_ratio(),
        }
    }
}

impl SessionConfig {
    /// Whether the values describe a usable threshold pair.
    pub fn is_valid(&self) -> bool {
        self.max_messages >= 1 && self.warning_ratio > 0.0 && self.warning_ratio <= 1.0
    }
}

/// Settings for an OpenAI-compatible text-generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    /// Override for the API base URL (e.g. a local proxy).
    #[serde(default)]
    pub base_url: Option<String>,

    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound on any single remote call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openai".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

/// Where the backup encryption key comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Environment variable holding the backup passphrase. When unset at
    /// runtime, a random key is generated into `backup.key` in the data dir.
    #[serde(default = "default_passphrase_env")]
    pub passphrase_env: String,
}

fn default_passphrase_env() -> String {
    "MEMORA_BACKUP_PASSPHRASE".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            passphrase_env: default_passphrase_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.session.max_messages, 100);
        assert_eq!(config.session.warning_ratio, 0.8);
        assert!(config.llm.is_none());
        assert_eq!(config.backup.passphrase_env, "MEMORA_BACKUP_PASSPHRASE");
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.llm.is_none());
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
[session]
max_messages = 40

[llm]
model = "gpt-4o-mini"
timeout_secs = 5
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.max_messages, 40);
        assert_eq!(config.session.warning_ratio, 0.8);

        let llm = config.llm.unwrap();
        assert_eq!(llm.provider_name, "openai");
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(llm.timeout_secs, 5);
    }

    #[test]
    fn test_session_config_validation() {
        assert!(SessionConfig::default().is_valid());
        assert!(!SessionConfig { max_messages: 0, warning_ratio: 0.8 }.is_valid());
        assert!(!SessionConfig { max_messages: 10, warning_ratio: 0.0 }.is_valid());
        assert!(!SessionConfig { max_messages: 10, warning_ratio: 1.5 }.is_valid());
        assert!(SessionConfig { max_messages: 10, warning_ratio: 1.0 }.is_valid());
    }
}
