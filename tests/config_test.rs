//! Unit tests for config.rs module

use std::fs;
use imessage_export::config::AppConfig;
use tempfile::tempdir;

#[test]
fn test_default_export_config() {
    let config = AppConfig::default();

    assert_eq!(config.export.output_directory, "imessage_export");
    assert_eq!(config.export.document_name, "imessages.html");
    assert_eq!(config.export.attachments_directory, "attachments");
    assert_eq!(config.export.placeholder_label, "(Attachment)");
    assert_eq!(config.export.title, "iMessage Export");
}

#[test]
fn test_default_source_config_is_empty() {
    let config = AppConfig::default();

    assert!(config.source.database_path.is_empty());
    assert!(config.source.backup_directory.is_empty());
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_config_validation_valid_log_levels() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let mut config = AppConfig::default();
        config.logging.level = level.to_string();
        assert!(config.validate().is_ok(), "Failed for level: {}", level);
    }
}

#[test]
fn test_config_validation_invalid_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_log_format() {
    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_document_name_with_separator() {
    let mut config = AppConfig::default();
    config.export.document_name = "sub/imessages.html".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_same_document_and_attachments_name() {
    let mut config = AppConfig::default();
    config.export.attachments_directory = "imessages.html".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_empty_placeholder() {
    let mut config = AppConfig::default();
    config.export.placeholder_label = " ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_with_extra_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        "[source]\ndatabase_path = \"/data/sms.db\"\n\n[export]\ntitle = \"Family\"\n",
    )
    .unwrap();

    let config = AppConfig::load(Some(&path)).expect("load");
    assert_eq!(config.source.database_path, "/data/sms.db");
    assert_eq!(config.export.title, "Family");
    assert_eq!(config.export.document_name, "imessages.html");
}

#[test]
fn test_load_with_missing_extra_file_fails() {
    let dir = tempdir().unwrap();
    assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
}
