//! Virtual path resolution: the single choke point between a client-supplied
//! path string and a real filesystem location. Every route that touches the
//! filesystem goes through `resolve`; nothing else may construct a real path.

use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::identity::Principal;

/// A proven-safe resolution of a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Leading virtual folder name.
    pub vpath: String,
    /// Remainder of the request, as supplied.
    pub relative_path: String,
    /// Absolutized real location, prefix-proven against `base_path`.
    pub real_path: PathBuf,
    /// Real base directory of `vpath`.
    pub base_path: PathBuf,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Unknown folder and unauthorized folder collapse to the same error so
    /// callers cannot enumerate the namespace.
    #[error("virtual path not found")]
    NotFound,
    /// Containment failure. Logged with the caller's identity before this is
    /// returned; the client-facing mapping is indistinguishable from NotFound.
    #[error("path escapes its folder")]
    Outside,
}

/// Resolve `directory` for `principal`. The leading segment names the virtual
/// folder; the remainder is joined under that folder's real base directory and
/// must stay inside it after lexical normalization.
pub fn resolve(
    directory: &str,
    principal: &Principal,
    config: &Config,
) -> Result<ResolvedPath, ResolveError> {
    let requested = directory.replace('\\', "/");
    let trimmed = requested.trim_start_matches('/');
    let (vpath, relative) = match trimmed.split_once('/') {
        Some((v, r)) => (v, r),
        None => (trimmed, ""),
    };
    if vpath.is_empty() {
        return Err(ResolveError::NotFound);
    }

    let authorized = match principal {
        Principal::User { vpaths, .. } | Principal::AnonymousAdmin { vpaths } => {
            vpaths.contains(vpath)
        }
        // A share grant's file membership was proven by the gate; resolution
        // may use any configured folder.
        Principal::Share { .. } => true,
        Principal::Invite => false,
    };
    if !authorized {
        return Err(ResolveError::NotFound);
    }

    let base = config.folder(vpath).ok_or(ResolveError::NotFound)?;
    let real = base
        .join(relative)
        .absolutize()
        .map_err(|_| ResolveError::NotFound)?
        .to_path_buf();

    if !is_prefix_path(&real, base) {
        warn!(
            "user '{}' attempted to access a directory they don't have access to: {}",
            principal.username(),
            real.display()
        );
        return Err(ResolveError::Outside);
    }

    Ok(ResolvedPath {
        vpath: vpath.to_string(),
        relative_path: relative.to_string(),
        real_path: real,
        base_path: base.to_path_buf(),
    })
}

fn is_prefix_path(path: &Path, prefix: &Path) -> bool {
    // Compare component-wise to avoid false positives like /music-1 vs /music
    path.starts_with(prefix)
}
