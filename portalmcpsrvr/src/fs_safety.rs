//! # Filesystem Safety Module
//!
//! The path containment guard. Candidate paths are fully resolved (symlinks
//! and `..` segments) before a prefix check against the canonicalized project
//! root, so both `..`-escapes and symlink-escapes are rejected on the resolved
//! path rather than on the requested string. Reads go through a capability
//! handle bound to the file's parent directory.

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Access denied: {path}")]
    AccessDenied { path: String },
    #[error("Not found: {path}")]
    NotFound { path: String },
    #[error("Not valid UTF-8: {path}")]
    InvalidUtf8 { path: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve `candidate` (absolute, or relative to `root`) and require the
/// resolved path to stay within `root`. `root` must already be canonical.
///
/// Returns the resolved path on success, `NotFound` when the path does not
/// exist, and `AccessDenied` when resolution escapes the root.
pub fn resolve_within_root(root: &Path, candidate: &Path) -> Result<PathBuf, FsError> {
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let canonical = dunce::canonicalize(&absolute).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound {
                path: absolute.display().to_string(),
            }
        } else {
            FsError::Io(e)
        }
    })?;

    if !canonical.starts_with(root) {
        debug!(
            "containment check rejected {} (resolved to {})",
            absolute.display(),
            canonical.display()
        );
        return Err(FsError::AccessDenied {
            path: absolute.display().to_string(),
        });
    }

    Ok(canonical)
}

/// Read the full text of an already-resolved file. The file is opened through
/// a capability handle bound to its parent directory, so a concurrent swap of
/// a path component for a symlink cannot redirect the read outside the root.
pub fn read_text(path: &Path) -> Result<String, FsError> {
    let parent = path.parent().ok_or_else(|| FsError::AccessDenied {
        path: path.display().to_string(),
    })?;
    let file_name = path.file_name().ok_or_else(|| FsError::AccessDenied {
        path: path.display().to_string(),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    let mut file = dir.open(file_name)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    String::from_utf8(buf).map_err(|_| FsError::InvalidUtf8 {
        path: path.display().to_string(),
    })
}
