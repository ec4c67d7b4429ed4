//! The container engine CLI used by the image and container connectors.

use anyhow::{Context, Result, bail};
use tokio::process::Command;

/// Environment variable naming the container engine binary.
pub const ENGINE_ENV_VAR: &str = "BOWTIE_CONTAINER_ENGINE";

/// A container engine reachable through a docker-compatible CLI
/// (`docker`, `podman`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEngine {
    binary: String,
}

impl ContainerEngine {
    /// The engine used when nothing else is configured.
    pub const DEFAULT_BINARY: &'static str = "docker";

    /// Use a specific engine binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve the engine: `BOWTIE_CONTAINER_ENGINE` > `docker`.
    pub fn from_env() -> Self {
        match std::env::var(ENGINE_ENV_VAR) {
            Ok(binary) if !binary.trim().is_empty() => Self::new(binary.trim()),
            _ => Self::new(Self::DEFAULT_BINARY),
        }
    }

    /// The engine binary name or path.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Start building an engine invocation.
    pub fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    /// Run an engine subcommand to completion and return its trimmed stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self
            .command()
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run {} {}", self.binary, args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} {} failed: {}", self.binary, args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Forcibly remove a container. A container that is already gone is
    /// not an error.
    pub async fn remove_container(&self, name: &str) -> Result<()> {
        let output = self
            .command()
            .args(["rm", "--force", name])
            .output()
            .await
            .with_context(|| format!("failed to run {} rm", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("No such container") {
                bail!("{} rm --force {name} failed: {}", self.binary, stderr.trim());
            }
        }

        Ok(())
    }
}

impl Default for ContainerEngine {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_binary() {
        let engine = ContainerEngine::new("podman");
        assert_eq!(engine.binary(), "podman");
    }

    #[tokio::test]
    async fn run_reports_missing_binary() {
        let engine = ContainerEngine::new("/nonexistent/bowtie-engine-xyz");
        let err = engine.run(&["ps"]).await.unwrap_err();
        assert!(
            err.to_string().contains("failed to run /nonexistent/bowtie-engine-xyz ps"),
            "unexpected error: {err}"
        );
    }
}
