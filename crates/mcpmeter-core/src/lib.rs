//! Core functionality for mcpmeter.
//!
//! This crate provides:
//! - The persisted server registry ([`ConfigStore`])
//! - The session controller behind the interactive and one-shot commands
//! - The error taxonomy and the exit code of each failure class
//! - Plain-text formatting of tools, results and token breakdowns

pub mod config;
pub mod error;
pub mod format;
pub mod session;

pub use config::{ConfigStore, Configuration, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, CoreError, CoreResult, ErrorCategory};
pub use session::{
    discover, run_once, CommandOutput, Discovery, LastCall, OneShotReport, OneShotRequest,
    Session, SessionCommand, SessionPhase, SessionState,
};
