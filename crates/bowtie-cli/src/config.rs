//! Configuration file management for bowtie.
//!
//! Provides a TOML-based config file at `~/.config/bowtie/config.toml` and a
//! resolution chain: env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use bowtie_core::ConnectorRegistry;
use bowtie_core::connector::ContainerEngine;
use bowtie_core::connector::engine::ENGINE_ENV_VAR;

use crate::connectable_arg::KNOWN_IMPLEMENTATIONS;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub containers: ContainersSection,
    pub implementations: ImplementationsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainersSection {
    /// Container engine CLI (`docker`, `podman`, or a path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImplementationsSection {
    /// Implementation names offered as completions.
    pub known: Vec<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the bowtie config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/bowtie` or `~/.config/bowtie`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("bowtie");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bowtie")
}

/// Return the path to the bowtie config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

/// The config written by `bowtie init`.
pub fn default_config_file() -> ConfigFile {
    ConfigFile {
        containers: ContainersSection {
            engine: Some(ContainerEngine::DEFAULT_BINARY.to_string()),
        },
        implementations: ImplementationsSection {
            known: KNOWN_IMPLEMENTATIONS.iter().map(|s| s.to_string()).collect(),
        },
    }
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct BowtieConfig {
    pub engine: ContainerEngine,
    pub known_implementations: Vec<String>,
}

impl BowtieConfig {
    /// Resolve configuration from the default config path.
    pub fn resolve() -> Self {
        Self::resolve_from(&config_path())
    }

    /// Resolve configuration using the chain: env var > config file > default.
    ///
    /// - Engine: `BOWTIE_CONTAINER_ENGINE` env > `containers.engine` > `docker`
    /// - Known implementations: `implementations.known` (if non-empty) > built-in list
    ///
    /// A missing config file is not an error. An unreadable one is logged
    /// and ignored, so `bowtie init --force` can still replace it.
    pub fn resolve_from(path: &Path) -> Self {
        let file_config = if path.exists() {
            load_config_from(path)
                .inspect_err(|e| warn!(error = %format!("{e:#}"), "ignoring config file"))
                .ok()
        } else {
            None
        };

        let engine = match std::env::var(ENGINE_ENV_VAR) {
            Ok(binary) if !binary.trim().is_empty() => ContainerEngine::new(binary.trim()),
            _ => file_config
                .as_ref()
                .and_then(|cfg| cfg.containers.engine.clone())
                .map(ContainerEngine::new)
                .unwrap_or_else(|| ContainerEngine::new(ContainerEngine::DEFAULT_BINARY)),
        };

        let known_implementations = match file_config {
            Some(cfg) if !cfg.implementations.known.is_empty() => cfg.implementations.known,
            _ => KNOWN_IMPLEMENTATIONS.iter().map(|s| s.to_string()).collect(),
        };

        Self {
            engine,
            known_implementations,
        }
    }

    /// A connector registry whose container connectors use the resolved
    /// engine.
    pub fn registry(&self) -> ConnectorRegistry {
        ConnectorRegistry::with_engine(self.engine.clone())
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
