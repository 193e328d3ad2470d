//! # Server Configuration
//!
//! Immutable startup configuration: the project root every filesystem
//! operation is resolved against, the managed application name, and the
//! external binaries the tool handlers invoke. Built once in `main` and
//! threaded into the router, catalog and tool registry.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Process-wide immutable configuration. The project root is canonicalized at
/// construction so containment checks are a plain prefix match on resolved
/// paths.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Canonicalized project root directory.
    pub project_root: PathBuf,
    /// Application name passed to the process manager.
    pub app_name: String,
    /// Process-manager binary (pm2).
    pub pm2_bin: String,
    /// Service-manager binary (systemctl).
    pub systemctl_bin: String,
    /// Script runtime binary (node).
    pub node_bin: String,
}

impl ServerConfig {
    pub fn new(
        root: &Path,
        app_name: String,
        pm2_bin: String,
        systemctl_bin: String,
        node_bin: String,
    ) -> Result<Self> {
        let project_root = dunce::canonicalize(root)
            .with_context(|| format!("Project root does not exist: {}", root.display()))?;
        if !project_root.is_dir() {
            anyhow::bail!("Project root is not a directory: {}", project_root.display());
        }

        Ok(ServerConfig {
            project_root,
            app_name,
            pm2_bin,
            systemctl_bin,
            node_bin,
        })
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.project_root.join("scripts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.project_root.join("logs")
    }

    pub fn database_dir(&self) -> PathBuf {
        self.project_root.join("database")
    }
}
