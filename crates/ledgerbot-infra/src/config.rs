//! Configuration loader for ledgerbot.
//!
//! Reads `config.toml` from the data directory (`~/.ledgerbot/` in production)
//! and deserializes it into [`LedgerConfig`]. A missing or malformed file falls
//! back to the defaults, so the bot always starts with a primary admin.

use std::path::Path;

use ledgerbot_types::config::LedgerConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`LedgerConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> LedgerConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return LedgerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return LedgerConfig::default();
        }
    };

    match toml::from_str::<LedgerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            LedgerConfig::default()
        }
    }
}
