//! Run accounting.
//!
//! Counts are kept on the collector for the end-of-run report and mirrored to
//! the `metrics` facade so an installed recorder can pick them up.

use std::path::PathBuf;
use std::time::Duration;

use metrics::{counter, histogram};
use tracing::info;

/// Metric names
pub mod names {
    /// Conversations assembled
    pub const CONVERSATIONS: &str = "imessage_export_conversations_total";
    /// Messages assembled
    pub const MESSAGES: &str = "imessage_export_messages_total";
    /// Attachment links, labelled by outcome
    pub const ATTACHMENTS: &str = "imessage_export_attachments_total";
    /// Bytes copied into the export
    pub const BYTES_COPIED: &str = "imessage_export_attachment_bytes_total";
    /// Timestamps rendered as raw values
    pub const TIMESTAMP_FALLBACKS: &str = "imessage_export_timestamp_fallbacks_total";
    /// Stage durations
    pub const STAGE_DURATION: &str = "imessage_export_stage_duration_seconds";
}

/// Counters for one export run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetricsCollector {
    /// Conversations assembled
    pub conversations: u64,
    /// Messages assembled
    pub messages: u64,
    /// Attachment links that were copied
    pub attachments_resolved: u64,
    /// Attachment links that were not
    pub attachments_unresolved: u64,
    /// Timestamps that fell back to the raw value
    pub timestamp_fallbacks: u64,
    /// Bytes copied into the attachments directory
    pub bytes_copied: u64,
}

impl MetricsCollector {
    /// Record one attachment link outcome
    pub fn record_attachment(&mut self, resolved: bool) {
        let outcome = if resolved {
            self.attachments_resolved += 1;
            "resolved"
        } else {
            self.attachments_unresolved += 1;
            "unresolved"
        };
        counter!(names::ATTACHMENTS, "outcome" => outcome).increment(1);
    }

    /// Record bytes written by attachment copies
    pub fn record_bytes_copied(&mut self, bytes: u64) {
        self.bytes_copied += bytes;
        counter!(names::BYTES_COPIED).increment(bytes);
    }

    /// Record one assembled message
    pub fn record_message(&mut self, timestamp_fallback: bool) {
        self.messages += 1;
        counter!(names::MESSAGES).increment(1);
        if timestamp_fallback {
            self.timestamp_fallbacks += 1;
            counter!(names::TIMESTAMP_FALLBACKS).increment(1);
        }
    }

    /// Record the number of conversations assembled
    pub fn record_conversations(&mut self, count: usize) {
        let count = count as u64;
        self.conversations += count;
        counter!(names::CONVERSATIONS).increment(count);
    }

    /// Record how long a pipeline stage took
    pub fn record_stage(&self, stage: &'static str, duration: Duration) {
        histogram!(names::STAGE_DURATION, "stage" => stage).record(duration.as_secs_f64());
    }
}

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Path of the rendered document
    pub document_path: PathBuf,
    /// Final counters
    pub metrics: MetricsCollector,
}

impl ExportReport {
    /// Log the report at info level
    pub fn log(&self) {
        info!(
            document = %self.document_path.display(),
            conversations = self.metrics.conversations,
            messages = self.metrics.messages,
            attachments_resolved = self.metrics.attachments_resolved,
            attachments_unresolved = self.metrics.attachments_unresolved,
            timestamp_fallbacks = self.metrics.timestamp_fallbacks,
            bytes_copied = self.metrics.bytes_copied,
            "Export finished"
        );
    }
}
