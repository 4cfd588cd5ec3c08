//! The export pipeline: store → lookups → attachments → conversations → HTML.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::attachments::AttachmentResolver;
use crate::config::AppConfig;
use crate::conversation::ConversationAssembler;
use crate::db::MessageStore;
use crate::error::{ExportError, Result};
use crate::logging::OperationTimer;
use crate::metrics::{ExportReport, MetricsCollector};
use crate::render::write_document_file;
use crate::validation::InputValidator;

/// Everything one export run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Message store database file
    pub database_path: PathBuf,
    /// Root of the backup tree holding attachment blobs
    pub backup_root: PathBuf,
    /// Directory the document and attachments are written to
    pub output_root: PathBuf,
    /// File name of the rendered document
    pub document_name: String,
    /// Name of the attachments directory inside the output root
    pub attachments_dir: String,
    /// Label substituted for missing-content markers
    pub placeholder_label: String,
    /// Document title
    pub title: String,
}

impl ExportOptions {
    /// Options from configuration with explicit input paths
    #[must_use]
    pub fn from_config(config: &AppConfig, database_path: &Path, backup_root: &Path) -> Self {
        Self {
            database_path: database_path.to_path_buf(),
            backup_root: backup_root.to_path_buf(),
            output_root: PathBuf::from(&config.export.output_directory),
            document_name: config.export.document_name.clone(),
            attachments_dir: config.export.attachments_directory.clone(),
            placeholder_label: config.export.placeholder_label.clone(),
            title: config.export.title.clone(),
        }
    }

    /// Path of the rendered document
    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.output_root.join(&self.document_name)
    }
}

/// Runs one export
pub struct ExportService {
    options: ExportOptions,
}

impl ExportService {
    /// Service for the given options
    #[must_use]
    pub const fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Options this service runs with
    #[must_use]
    pub const fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Run the pipeline.
    ///
    /// Store problems abort before anything is written. Attachment and
    /// timestamp problems are absorbed and counted in the report.
    pub fn run(&self) -> Result<ExportReport> {
        let options = &self.options;
        let mut metrics = MetricsCollector::default();

        InputValidator::validate_output_name(&options.document_name)
            .and_then(|()| InputValidator::validate_output_name(&options.attachments_dir))
            .map_err(|e| ExportError::InvalidConfig(e.to_string()))?;
        InputValidator::validate_store_path(&options.database_path)
            .map_err(|e| ExportError::InvalidInput(e.to_string()))?;
        if let Err(e) = InputValidator::validate_backup_root(&options.backup_root) {
            warn!(error = %e, "Backup directory unusable, attachments will be unresolved");
        }

        let timer = OperationTimer::new("read_store");
        let store = MessageStore::open(&options.database_path)?;
        let chats = store.chat_handle_lookup()?;
        let attachment_index = store.attachment_index()?;
        let rows = store.message_stream()?;
        metrics.record_stage(timer.operation(), timer.finish());
        info!(
            chats = chats.len(),
            attachment_links = attachment_index.link_count(),
            messages = rows.len(),
            "Read message store"
        );

        fs::create_dir_all(options.output_root.join(&options.attachments_dir))?;

        let timer = OperationTimer::new("resolve_attachments");
        let mut resolver = AttachmentResolver::new(&options.backup_root, &options.output_root, &options.attachments_dir);
        let resolved = resolver.resolve_index(&attachment_index, &mut metrics);
        metrics.record_stage(timer.operation(), timer.finish());
        info!(
            resolved = metrics.attachments_resolved,
            unresolved = metrics.attachments_unresolved,
            "Resolved attachments"
        );

        let timer = OperationTimer::new("assemble");
        let conversations = ConversationAssembler::new(&chats, &resolved)
            .with_placeholder(&options.placeholder_label)
            .assemble(&rows, &mut metrics);
        metrics.record_stage(timer.operation(), timer.finish());

        let timer = OperationTimer::new("render");
        let document_path = options.document_path();
        write_document_file(&document_path, &conversations, &options.title)?;
        metrics.record_stage(timer.operation(), timer.finish());

        Ok(ExportReport {
            document_path,
            metrics,
        })
    }
}
