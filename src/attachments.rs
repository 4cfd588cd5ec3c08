//! Attachment resolution.
//!
//! Backups lay attachment blobs out in one of two ways, so each is a
//! [`ResolutionStrategy`]:
//!
//! - [`DirectFilename`]: the stored filename is a relative path and the blob
//!   sits at `<backup>/<first two chars>/<filename>`, taken literally first
//!   and then with any `~/` or `/` prefix dropped.
//! - [`GuidDigest`]: the blob is named by the SHA-1 of the attachment guid and
//!   sits at `<backup>/<first two hex chars>/<hex digest>`.
//!
//! [`AttachmentResolver`] tries the strategies in order, copies the first hit
//! into the export's attachments directory and memoises the outcome per
//! reference key. A missing or unreadable blob is recorded as
//! [`Resolution::Unresolved`] and never stops the run.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::metrics::MetricsCollector;
use crate::models::{Attachment, AttachmentIndex, AttachmentRef, Resolution, UnresolvedReason};

/// A source blob and where its copy goes, relative to the attachments directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path inside the backup tree
    pub source: PathBuf,
    /// Path of the copy, relative to the attachments directory
    pub destination: PathBuf,
}

/// What a strategy made of an attachment reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Source paths to probe, in order
    Candidates(Vec<Candidate>),
    /// The attachment lacks the field this strategy needs
    NotApplicable,
    /// The field is present but unusable
    Invalid(String),
}

/// One way of mapping an attachment to a blob in the backup tree
#[cfg_attr(test, mockall::automock)]
pub trait ResolutionStrategy {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Derive the source path for `attachment` under `backup_root`
    fn locate(&self, backup_root: &Path, attachment: &AttachmentRef) -> Located;
}

/// Strategy A: the stored filename is the blob's relative path
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectFilename;

impl ResolutionStrategy for DirectFilename {
    fn name(&self) -> &'static str {
        "direct-filename"
    }

    fn locate(&self, backup_root: &Path, attachment: &AttachmentRef) -> Located {
        let Some(filename) = attachment.filename.as_deref().filter(|f| !f.trim().is_empty()) else {
            return Located::NotApplicable;
        };
        let relative = match normalise_relative(filename) {
            Ok(relative) => relative,
            Err(reason) => return Located::Invalid(reason),
        };

        let mut candidates = Vec::with_capacity(2);
        if !Path::new(filename).has_root() {
            candidates.push(Candidate {
                source: bucketed(backup_root, filename, Path::new(filename)),
                destination: relative.clone(),
            });
        }
        let normalised = bucketed(backup_root, &relative.to_string_lossy(), &relative);
        if candidates.iter().all(|c| c.source != normalised) {
            candidates.push(Candidate {
                source: normalised,
                destination: relative,
            });
        }
        Located::Candidates(candidates)
    }
}

/// `<backup>/<first two chars of name>/<relative>`
fn bucketed(backup_root: &Path, name: &str, relative: &Path) -> PathBuf {
    let prefix: String = name.chars().take(2).collect();
    backup_root.join(prefix).join(relative)
}

/// Strategy B: the blob is named by the SHA-1 digest of the attachment guid
#[derive(Debug, Default, Clone, Copy)]
pub struct GuidDigest;

impl ResolutionStrategy for GuidDigest {
    fn name(&self) -> &'static str {
        "guid-digest"
    }

    fn locate(&self, backup_root: &Path, attachment: &AttachmentRef) -> Located {
        let Some(guid) = attachment.guid.as_deref().filter(|g| !g.trim().is_empty()) else {
            return Located::NotApplicable;
        };
        let digest = guid_digest(guid);
        let bucket = &digest[..2];

        let mut copy_name = digest.clone();
        if let Some(ext) = attachment.transfer_name.as_deref().and_then(safe_extension) {
            copy_name.push('.');
            copy_name.push_str(&ext);
        }

        Located::Candidates(vec![Candidate {
            source: backup_root.join(bucket).join(&digest),
            destination: Path::new(bucket).join(copy_name),
        }])
    }
}

/// Lowercase hex SHA-1 of the guid's UTF-8 bytes
#[must_use]
pub fn guid_digest(guid: &str) -> String {
    hex::encode(Sha1::digest(guid.as_bytes()))
}

/// Turn a stored filename into a relative path that stays inside its parent.
///
/// Stores often record `~/Library/SMS/...`; the home prefix and leading
/// slashes are dropped. Any `..` component is rejected.
fn normalise_relative(filename: &str) -> Result<PathBuf, String> {
    let trimmed = filename.trim();
    let trimmed = trimmed.strip_prefix("~/").unwrap_or(trimmed).trim_start_matches('/');

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!("{filename} escapes the backup tree"));
            },
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(format!("{filename} names no file"));
    }
    Ok(relative)
}

fn safe_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Copy `source` to `destination`, creating parent directories and carrying
/// over the modification time and permissions. Returns the number of bytes
/// copied.
///
/// An existing destination is replaced even when it is read-only. Failing to
/// stamp metadata on the copy is logged, the bytes are already in place.
pub fn copy_preserving_mtime(source: &Path, destination: &Path) -> io::Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut reader = File::open(source)?;
    let metadata = reader.metadata()?;

    match fs::remove_file(destination) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
        _ => {},
    }
    let mut writer = File::create(destination)?;
    let bytes = io::copy(&mut reader, &mut writer)?;

    // Stamp through the open handle; the source mode may forbid reopening.
    if let Err(err) = metadata.modified().and_then(|modified| writer.set_modified(modified)) {
        warn!(path = %destination.display(), error = %err, "Could not keep modification time");
    }
    drop(writer);
    if let Err(err) = fs::set_permissions(destination, metadata.permissions()) {
        warn!(path = %destination.display(), error = %err, "Could not keep permissions");
    }
    Ok(bytes)
}

/// Join path components with `/` regardless of host separator
fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolved attachments per message, immutable once built
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttachments {
    by_message: HashMap<i64, Vec<Attachment>>,
}

impl ResolvedAttachments {
    /// Attachments for a message (empty when none)
    #[must_use]
    pub fn get(&self, message_id: i64) -> &[Attachment] {
        self.by_message.get(&message_id).map_or(&[], Vec::as_slice)
    }

    /// Number of messages with at least one attachment
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.by_message.len()
    }
}

/// Copies attachment blobs out of a backup tree into the export
pub struct AttachmentResolver {
    backup_root: PathBuf,
    attachments_root: PathBuf,
    attachments_dir: String,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    memo: HashMap<String, Resolution>,
    bytes_copied: u64,
}

impl AttachmentResolver {
    /// Resolver with both strategies, filename first.
    ///
    /// Copies land in `<export_root>/<attachments_dir>`.
    #[must_use]
    pub fn new(backup_root: &Path, export_root: &Path, attachments_dir: &str) -> Self {
        Self::with_strategies(
            backup_root,
            export_root,
            attachments_dir,
            vec![Box::new(DirectFilename), Box::new(GuidDigest)],
        )
    }

    /// Resolver with an explicit strategy order
    #[must_use]
    pub fn with_strategies(
        backup_root: &Path,
        export_root: &Path,
        attachments_dir: &str,
        strategies: Vec<Box<dyn ResolutionStrategy>>,
    ) -> Self {
        Self {
            backup_root: backup_root.to_path_buf(),
            attachments_root: export_root.join(attachments_dir),
            attachments_dir: attachments_dir.trim_matches('/').to_string(),
            strategies,
            memo: HashMap::new(),
            bytes_copied: 0,
        }
    }

    /// Total bytes copied so far
    #[must_use]
    pub const fn bytes_copied(&self) -> u64 {
        self.bytes_copied
    }

    /// Resolve one attachment. Each reference key is attempted once per run.
    pub fn resolve(&mut self, attachment: &AttachmentRef) -> Resolution {
        let Some(key) = attachment.reference_key().map(ToString::to_string) else {
            return Resolution::Unresolved(UnresolvedReason::NoReference);
        };
        if let Some(known) = self.memo.get(&key) {
            return known.clone();
        }

        let resolution = self.attempt(attachment);
        match &resolution {
            Resolution::Resolved(path) => debug!(reference = %key, path = %path, "Copied attachment"),
            Resolution::Unresolved(reason) => warn!(reference = %key, %reason, "Attachment unresolved"),
        }
        self.memo.insert(key, resolution.clone());
        resolution
    }

    fn attempt(&mut self, attachment: &AttachmentRef) -> Resolution {
        let mut tried = Vec::new();
        let mut invalid = None;

        for strategy in &self.strategies {
            match strategy.locate(&self.backup_root, attachment) {
                Located::NotApplicable => {},
                Located::Invalid(reason) => {
                    debug!(strategy = strategy.name(), %reason, "Reference rejected");
                    invalid.get_or_insert(reason);
                },
                Located::Candidates(candidates) => {
                    for candidate in candidates {
                        if !candidate.source.is_file() {
                            tried.push(candidate.source);
                            continue;
                        }
                        let destination = self.attachments_root.join(&candidate.destination);
                        return match copy_preserving_mtime(&candidate.source, &destination) {
                            Ok(bytes) => {
                                self.bytes_copied += bytes;
                                Resolution::Resolved(self.export_relative(&candidate.destination))
                            },
                            Err(err) => Resolution::Unresolved(UnresolvedReason::CopyFailed {
                                path: candidate.source,
                                message: err.to_string(),
                            }),
                        };
                    }
                },
            }
        }

        let reason = match invalid {
            Some(reason) if tried.is_empty() => UnresolvedReason::InvalidReference(reason),
            _ if tried.is_empty() => UnresolvedReason::NoReference,
            _ => UnresolvedReason::NotFound { tried },
        };
        Resolution::Unresolved(reason)
    }

    fn export_relative(&self, destination: &Path) -> String {
        let inner = to_forward_slashes(destination);
        if self.attachments_dir.is_empty() {
            inner
        } else {
            format!("{}/{inner}", self.attachments_dir)
        }
    }

    /// Resolve every link in the index, recording outcomes in `metrics`.
    ///
    /// Messages are visited in row id order, so the first link to claim a
    /// shared reference key is the same on every run.
    pub fn resolve_index(&mut self, index: &AttachmentIndex, metrics: &mut MetricsCollector) -> ResolvedAttachments {
        let before = self.bytes_copied;
        let mut by_message = HashMap::new();

        for (message_id, refs) in index.iter() {
            let attachments: Vec<Attachment> = refs
                .iter()
                .map(|attachment| {
                    let resolution = self.resolve(attachment);
                    metrics.record_attachment(resolution.is_resolved());
                    Attachment {
                        reference_key: attachment.reference_key().unwrap_or_default().to_string(),
                        mime_type: attachment.mime_type.clone(),
                        display_name: attachment.transfer_name.clone(),
                        resolution,
                    }
                })
                .collect();
            by_message.insert(message_id, attachments);
        }

        metrics.record_bytes_copied(self.bytes_copied - before);
        ResolvedAttachments { by_message }
    }
}
