//! Persisted server registry.
//!
//! The whole document is read once when the store is opened and rewritten
//! after every mutation.

use crate::error::{ConfigError, CoreResult};
use mcpmeter_mcp::ServerConfig;
use mcpmeter_provider::DEFAULT_OVERHEAD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mcp_config.json";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "MCPMETER_CONFIG";

fn default_overhead() -> u64 {
    DEFAULT_OVERHEAD
}

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Registered servers by name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,

    /// Server used when a command does not name one.
    #[serde(default)]
    pub default_server: Option<String>,

    /// Default token overhead for analyses.
    #[serde(default = "default_overhead")]
    pub token_overhead: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            servers: BTreeMap::new(),
            default_server: None,
            token_overhead: DEFAULT_OVERHEAD,
        }
    }
}

impl Configuration {
    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, server) in &self.servers {
            if key != &server.name {
                return Err(ConfigError::Validation {
                    message: format!("server entry '{key}' is named '{}'", server.name),
                });
            }
            server.validate().map_err(|e| ConfigError::Validation {
                message: format!("server '{key}': {e}"),
            })?;
        }

        if let Some(default) = &self.default_server {
            if !self.servers.contains_key(default) {
                return Err(ConfigError::Validation {
                    message: format!("default server '{default}' is not configured"),
                });
            }
        }

        Ok(())
    }
}

/// File-backed configuration.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Configuration,
}

impl ConfigStore {
    /// Load the configuration at `path`.
    ///
    /// A missing file yields an empty configuration. An unreadable or invalid
    /// file is an error and is never overwritten.
    pub async fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();

        let config = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let config: Configuration =
                    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                config.validate()?;
                debug!(path = %path.display(), servers = config.servers.len(), "Loaded config");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, starting empty");
                Configuration::default()
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
                .into())
            }
        };

        Ok(Self { path, config })
    }

    /// Create a store around an in-memory configuration.
    pub fn with_config(path: impl Into<PathBuf>, config: Configuration) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Write the whole document.
    pub async fn save(&self) -> CoreResult<()> {
        let content = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::InvalidJson {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await.map_err(|e| ConfigError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        info!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Register a server, replacing any existing entry with the same name.
    ///
    /// The first server added becomes the default.
    pub async fn add_server(&mut self, server: ServerConfig) -> CoreResult<()> {
        server.validate().map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })?;

        let name = server.name.clone();
        let replaced = self.config.servers.insert(name.clone(), server).is_some();
        if self.config.default_server.is_none() {
            self.config.default_server = Some(name.clone());
        }

        debug!(server = %name, replaced, "Added server");
        self.save().await
    }

    /// Remove a server, clearing the default if it pointed at it.
    pub async fn remove_server(&mut self, name: &str) -> CoreResult<ServerConfig> {
        let removed =
            self.config
                .servers
                .remove(name)
                .ok_or_else(|| ConfigError::ServerNotFound {
                    name: name.to_string(),
                })?;

        if self.config.default_server.as_deref() == Some(name) {
            self.config.default_server = None;
        }

        debug!(server = %name, "Removed server");
        self.save().await?;
        Ok(removed)
    }

    /// Make an existing server the default.
    pub async fn set_default(&mut self, name: &str) -> CoreResult<()> {
        if !self.config.servers.contains_key(name) {
            return Err(ConfigError::ServerNotFound {
                name: name.to_string(),
            }
            .into());
        }
        self.config.default_server = Some(name.to_string());
        self.save().await
    }

    /// Look up a server by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.config.servers.get(name)
    }

    /// The named server, or the default when no name is given.
    pub fn resolve(&self, name: Option<&str>) -> CoreResult<&ServerConfig> {
        let name = match name {
            Some(name) => name,
            None => self
                .config
                .default_server
                .as_deref()
                .ok_or(ConfigError::NoServerSelected)?,
        };

        self.server(name).ok_or_else(|| {
            ConfigError::ServerNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }
}
