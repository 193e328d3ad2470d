//! # Resource Catalog
//!
//! Enumerates the files exposed over `resources/list` and reads one of them
//! by URI for `resources/read`. Enumeration covers the fixed top-level project
//! files, the scripts directory, markdown documentation at the root, log files
//! and database files. Every read passes through the containment guard.

use crate::config::ServerConfig;
use crate::fs_safety::{self, FsError};
use portalmcp_common::{ResourceContent, ResourceInfo, ResourcesReadResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Fixed top-level files exposed when present.
const MAIN_FILES: [&str; 3] = ["server.js", "package.json", ".env"];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),
    #[error(transparent)]
    Fs(#[from] FsError),
}

pub struct ResourceCatalog {
    config: Arc<ServerConfig>,
}

impl ResourceCatalog {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }

    /// Enumerate all exposable resources. Missing subdirectories contribute
    /// zero entries; directory scans are name-sorted for deterministic output.
    pub fn list(&self) -> Vec<ResourceInfo> {
        let root = &self.config.project_root;
        let mut resources = Vec::new();

        for name in MAIN_FILES {
            let path = root.join(name);
            if path.is_file() {
                resources.push(ResourceInfo {
                    uri: file_uri(&path),
                    name: name.to_string(),
                    description: format!("Project file {}", name),
                    mime_type: mime_type_for(&path).to_string(),
                });
            }
        }

        for path in files_with_extension(&self.config.scripts_dir(), "js") {
            let file_name = display_name(&path);
            resources.push(ResourceInfo {
                uri: file_uri(&path),
                name: format!("scripts/{}", file_name),
                description: format!("Script: {}", file_name),
                mime_type: "application/javascript".to_string(),
            });
        }

        for path in files_with_extension(root, "md") {
            let file_name = display_name(&path);
            resources.push(ResourceInfo {
                uri: file_uri(&path),
                name: file_name.clone(),
                description: format!("Documentation: {}", file_name),
                mime_type: "text/markdown".to_string(),
            });
        }

        for path in files_with_extension(&self.config.logs_dir(), "log") {
            let file_name = display_name(&path);
            resources.push(ResourceInfo {
                uri: file_uri(&path),
                name: format!("logs/{}", file_name),
                description: format!("Log: {}", file_name),
                mime_type: "text/plain".to_string(),
            });
        }

        for path in files_with_extension(&self.config.database_dir(), "db") {
            let file_name = display_name(&path);
            resources.push(ResourceInfo {
                uri: file_uri(&path),
                name: format!("database/{}", file_name),
                description: format!("Database: {}", file_name),
                mime_type: "application/x-sqlite3".to_string(),
            });
        }

        debug!("catalog enumerated {} resources", resources.len());
        resources
    }

    /// Read one resource by `file://` URI, subject to the containment guard.
    pub fn read(&self, uri: &str) -> Result<ResourcesReadResult, CatalogError> {
        let path = uri
            .strip_prefix("file://")
            .ok_or_else(|| CatalogError::UnsupportedUri(uri.to_string()))?;

        let resolved =
            fs_safety::resolve_within_root(&self.config.project_root, Path::new(path))?;
        let text = fs_safety::read_text(&resolved)?;

        Ok(ResourcesReadResult {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                mime_type: mime_type_for(&resolved).to_string(),
                text,
            }],
        })
    }
}

/// Map a file extension to a content-type label.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        Some("txt") | Some("log") | Some("env") => "text/plain",
        Some("db") => "application/x-sqlite3",
        Some("sql") => "application/sql",
        Some("py") => "text/x-python",
        Some("sh") => "text/x-shellscript",
        _ => "application/octet-stream",
    }
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Immediate children of `dir` with the given extension, sorted by name.
/// A missing or unreadable directory yields no entries.
fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension)
        })
        .collect();
    files.sort();
    files
}
