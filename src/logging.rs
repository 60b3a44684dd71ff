use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Terminal level for the given flags; `RUST_LOG` overrides it.
pub fn terminal_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose == 0 {
        "info"
    } else if verbose == 1 {
        "debug"
    } else {
        "trace"
    }
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("binmgr_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Terminal output on stderr plus, when `log_dir` is given, a debug-level
/// log file for this run. Returns the log file path.
pub fn setup_logging(verbose: u8, quiet: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(terminal_level(verbose, quiet)));

    let terminal = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(filter);

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create log directory {}", dir.display()))?;
            let path = log_file_path(dir);
            let file = fs::File::create(&path)
                .with_context(|| format!("Could not create log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(
                    Targets::new()
                        .with_target(env!("CARGO_CRATE_NAME"), Level::DEBUG)
                        .with_default(Level::WARN),
                );
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(terminal)
        .with(file_layer)
        .try_init()
        .context("Could not install log subscriber")?;

    Ok(log_path)
}
