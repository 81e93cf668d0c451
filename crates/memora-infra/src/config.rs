//! Global configuration loader and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.memora/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use memora_types::config::{GlobalConfig, SessionConfig};

pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// 1. `MEMORA_DATA_DIR` environment variable
/// 2. `~/.memora`
/// 3. `./.memora` as a last resort
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MEMORA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".memora");
    }

    PathBuf::from(".memora")
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: warning, then the default.
/// - Session thresholds that fail validation are replaced by the defaults
///   with a warning; the rest of the file is kept.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    let mut config = match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    if !config.session.is_valid() {
        tracing::warn!(
            max_messages = config.session.max_messages,
            warning_ratio = config.session.warning_ratio,
            "Invalid session thresholds in {}, using defaults",
            config_path.display()
        );
        config.session = SessionConfig::default();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.llm.is_none());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[session]
max_messages = 20
warning_ratio = 0.5

[llm]
provider_name = "mistral"
model = "mistral-small-latest"

[backup]
passphrase_env = "MY_PASSPHRASE"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session.max_messages, 20);
        assert_eq!(config.session.warning_ratio, 0.5);
        assert_eq!(config.llm.unwrap().provider_name, "mistral");
        assert_eq!(config.backup.passphrase_env, "MY_PASSPHRASE");
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session, SessionConfig::default());
    }

    #[tokio::test]
    async fn load_global_config_invalid_thresholds_revert_but_keep_rest() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[session]
max_messages = 0

[backup]
passphrase_env = "KEPT"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.backup.passphrase_env, "KEPT");
    }
}
