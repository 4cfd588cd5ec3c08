use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use imessage_export::config::AppConfig;
use imessage_export::logging::init_logging;
use imessage_export::validation::InputValidator;
use imessage_export::{ExportOptions, ExportService};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the message store database (asked for when omitted)
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Root of the backup directory holding attachments (asked for when omitted)
    #[arg(short, long)]
    backup: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Additional configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file as well as stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _guard = init_logging(Some(&config.get_log_level()), log_file, &config.logging.format)?;

    info!("Starting imessage-export");

    let database_path = resolve_input(
        &config.source.database_path,
        "Enter the path to your database file (usually starts with '3d0d7'): ",
    )?;
    let backup_root = resolve_input(
        &config.source.backup_directory,
        "Enter the path to your iMessage backup directory: ",
    )?;

    let service = ExportService::new(ExportOptions::from_config(&config, &database_path, &backup_root));
    let report = match service.run() {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Export failed");
            return Err(e.into());
        },
    };

    report.log();
    print_completion(&report.document_path);
    Ok(())
}

/// Command line flags win over every configuration source
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        config.source.database_path = db.to_string_lossy().into_owned();
    }
    if let Some(backup) = &cli.backup {
        config.source.backup_directory = backup.to_string_lossy().into_owned();
    }
    if let Some(output) = &cli.output {
        config.export.output_directory = output.to_string_lossy().into_owned();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(file) = &cli.log_file {
        config.logging.file_path = Some(file.to_string_lossy().into_owned());
    }
}

/// Use the configured path, or ask for one on stdin
fn resolve_input(configured: &str, prompt: &str) -> Result<PathBuf> {
    if !configured.trim().is_empty() {
        return Ok(PathBuf::from(configured.trim()));
    }

    let mut stdout = io::stdout().lock();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    Ok(PathBuf::from(InputValidator::sanitize_prompt_path(&line)))
}

#[allow(clippy::print_stdout)]
fn print_completion(document_path: &Path) {
    println!("File exported to {}.", document_path.display());
}
