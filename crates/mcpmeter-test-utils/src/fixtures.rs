//! Temporary configuration files.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding an `mcp_config.json`.
///
/// The directory is removed when the fixture is dropped.
pub struct TempConfig {
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempConfig {
    /// A directory without a config file.
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("mcp_config.json");
        Self { temp_dir, path }
    }

    /// A config file containing `document`.
    pub fn with_document(document: &Value) -> Self {
        let fixture = Self::empty();
        let content = serde_json::to_string_pretty(document).expect("Failed to serialize config");
        fixture.write_raw(&content);
        fixture
    }

    /// Overwrite the config file with arbitrary text.
    pub fn write_raw(&self, content: &str) {
        fs::write(&self.path, content).expect("Failed to write config file");
    }

    pub fn read(&self) -> Value {
        let content = fs::read_to_string(&self.path).expect("Failed to read config file");
        serde_json::from_str(&content).expect("Config file is not valid JSON")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}
