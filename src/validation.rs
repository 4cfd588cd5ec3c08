use anyhow::{anyhow, Result};
use std::path::{Component, Path};

/// Validation utilities for user-supplied paths and names
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate the message store path
    pub fn validate_store_path(path: &Path) -> Result<()> {
        Self::validate_not_empty(path, "Message store path")?;

        if !path.exists() {
            return Err(anyhow!("Message store does not exist: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow!("Message store is not a file: {}", path.display()));
        }

        Ok(())
    }

    /// Validate the backup root
    pub fn validate_backup_root(path: &Path) -> Result<()> {
        Self::validate_not_empty(path, "Backup directory")?;

        if !path.exists() {
            return Err(anyhow!("Backup directory does not exist: {}", path.display()));
        }

        if !path.is_dir() {
            return Err(anyhow!("Backup directory is not a directory: {}", path.display()));
        }

        Ok(())
    }

    /// Validate a file or directory name created inside the output root.
    ///
    /// Must be a single normal path component.
    pub fn validate_output_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("Name cannot be empty"));
        }

        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(anyhow!("Name contains invalid characters"));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(anyhow!("Name must be a single path component: {name}")),
        }
    }

    fn validate_not_empty(path: &Path, what: &str) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("{what} cannot be empty"));
        }

        // Check path length
        if path.as_os_str().len() > 4096 {
            return Err(anyhow!("{what} too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Clean a path typed at an interactive prompt.
    ///
    /// Trims whitespace and one layer of matching quotes, which terminals add
    /// when a file is dragged in.
    #[must_use]
    pub fn sanitize_prompt_path(input: &str) -> String {
        let trimmed = input.trim();
        for quote in ['"', '\''] {
            if let Some(inner) = trimmed.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
                return inner.to_string();
            }
        }
        trimmed.to_string()
    }
}
