use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::{self, LoggingSettings};

/// Install the global subscriber. Stdout belongs to the TUI, so events go to
/// a log file, or nowhere when no file can be opened.
pub fn init(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let path = settings.file.clone().or_else(config::default_log_path);
    let writer = match path.as_deref().map(|p| (p, open(p))) {
        Some((_, Ok(file))) => BoxMakeWriter::new(Mutex::new(file)),
        Some((p, Err(e))) => {
            eprintln!("encore: cannot open log file {}: {e}", p.display());
            BoxMakeWriter::new(io::sink)
        }
        None => BoxMakeWriter::new(io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
}

fn open(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
