use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::conversation::DEFAULT_PLACEHOLDER;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

/// Where the message store and backup tree live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the message store database; empty means ask
    pub database_path: String,
    /// Root of the backup tree holding attachment blobs; empty means ask
    pub backup_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_directory: String,
    pub document_name: String,
    pub attachments_directory: String,
    pub placeholder_label: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            export: ExportConfig {
                output_directory: "imessage_export".to_string(),
                document_name: "imessages.html".to_string(),
                attachments_directory: "attachments".to_string(),
                placeholder_label: DEFAULT_PLACEHOLDER.to_string(),
                title: "iMessage Export".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence.
    ///
    /// Defaults, then `config/default`, `config/local`, `imessage-export`
    /// (any format the `config` crate reads), then `extra` when given, then
    /// `IMESSAGE_EXPORT__<SECTION>__<KEY>` environment variables.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("imessage-export").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("IMESSAGE_EXPORT").prefix_separator("__").separator("__"))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        // Validate export config
        if self.export.output_directory.trim().is_empty() {
            return Err(anyhow::anyhow!("output_directory cannot be empty"));
        }
        crate::validation::InputValidator::validate_output_name(&self.export.document_name)
            .map_err(|e| anyhow::anyhow!("document_name: {}", e))?;
        crate::validation::InputValidator::validate_output_name(&self.export.attachments_directory)
            .map_err(|e| anyhow::anyhow!("attachments_directory: {}", e))?;
        if self.export.document_name == self.export.attachments_directory {
            return Err(anyhow::anyhow!("document_name and attachments_directory must differ"));
        }
        if self.export.placeholder_label.trim().is_empty() {
            return Err(anyhow::anyhow!("placeholder_label cannot be empty"));
        }

        Ok(())
    }

    /// Path of the rendered document
    pub fn document_path(&self) -> PathBuf {
        Path::new(&self.export.output_directory).join(&self.export.document_name)
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| self.logging.level.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.export.output_directory, "imessage_export");
        assert_eq!(config.export.document_name, "imessages.html");
        assert_eq!(config.export.placeholder_label, "(Attachment)");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.export.attachments_directory = "../elsewhere".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_document_path() {
        let config = AppConfig::default();
        assert_eq!(config.document_path(), PathBuf::from("imessage_export/imessages.html"));
    }
}
