//! Logging initialization.
//!
//! Results go to stdout, so logs are written to a file unless `--verbose`
//! asks for them on stderr.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const VERBOSE_FILTER: &str =
    "mcpmeter=debug,mcpmeter_core=debug,mcpmeter_mcp=debug,mcpmeter_provider=debug";
const DEFAULT_FILTER: &str =
    "mcpmeter=info,mcpmeter_core=info,mcpmeter_mcp=info,mcpmeter_provider=info";

/// Initialize logging. Returns the log file path when logging to a file.
///
/// `RUST_LOG` overrides the built-in filters.
pub fn init_logging(verbose: bool) -> Option<PathBuf> {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let log_dir = get_log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {e}");
        return None;
    }

    let log_file = log_dir.join("mcpmeter.log");
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(file)
        .init();

    Some(log_file)
}

/// Get the log directory path.
pub fn get_log_dir() -> PathBuf {
    // macOS: ~/Library/Logs/mcpmeter
    // Linux: ~/.local/state/mcpmeter/logs
    // Windows: %LOCALAPPDATA%/mcpmeter/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/mcpmeter");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("mcpmeter/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/mcpmeter/logs");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app) = dirs::data_local_dir() {
            return local_app.join("mcpmeter/logs");
        }
    }

    PathBuf::from(".mcpmeter/logs")
}
