//! External tool resolution
//!
//! The server shells out to a metadata probe tool and a transcoding tool. Each
//! has a modern name and a legacy fallback name (`ffprobe`/`avprobe`,
//! `ffmpeg`/`avconv`). Resolution happens once at startup; the resolved path is
//! handed to the services that run the tools.

use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A tool known under a primary name and a legacy fallback name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolNames {
    pub primary: &'static str,
    pub fallback: &'static str,
}

/// Metadata probe tool
pub const PROBE_TOOL: ToolNames = ToolNames {
    primary: "ffprobe",
    fallback: "avprobe",
};

/// Transcoding tool
pub const TRANSCODE_TOOL: ToolNames = ToolNames {
    primary: "ffmpeg",
    fallback: "avconv",
};

/// Resolve a tool from the `PATH` environment variable
///
/// Prefers the primary name; falls back to the legacy name.
pub fn resolve_tool(names: ToolNames) -> Result<PathBuf> {
    let search_path = std::env::var_os("PATH").unwrap_or_default();
    resolve_tool_in(names, &search_path)
}

/// Resolve a tool against an explicit search path (same syntax as `PATH`)
pub fn resolve_tool_in(names: ToolNames, search_path: &OsStr) -> Result<PathBuf> {
    for name in [names.primary, names.fallback] {
        if let Some(path) = find_executable(name, search_path) {
            info!("Using {} for {}", path.display(), names.primary);
            return Ok(path);
        }
        debug!("'{}' not found on search path", name);
    }

    Err(Error::ToolNotFound {
        primary: names.primary.to_string(),
        fallback: names.fallback.to_string(),
    })
}

/// Resolve a tool, honoring an explicit override when one is configured
///
/// An override containing a path separator must point at an executable file;
/// a bare name is looked up on `PATH` without the fallback.
pub fn resolve_configured_tool(names: ToolNames, configured: Option<&Path>) -> Result<PathBuf> {
    let Some(configured) = configured else {
        return resolve_tool(names);
    };

    if configured.components().count() > 1 {
        if is_executable(configured) {
            return Ok(configured.to_path_buf());
        }
        return Err(Error::ToolNotUsable(configured.to_path_buf()));
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    find_executable(configured.as_os_str(), &search_path)
        .ok_or_else(|| Error::ToolNotUsable(configured.to_path_buf()))
}

/// Find the first executable file named `name` in `search_path`
pub fn find_executable(name: impl AsRef<OsStr>, search_path: &OsStr) -> Option<PathBuf> {
    let name = name.as_ref();
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidate_files(&dir, name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidate_files(dir: &Path, name: &OsStr) -> Vec<PathBuf> {
    let plain = dir.join(name);
    let mut with_ext = plain.clone().into_os_string();
    with_ext.push(".exe");
    vec![PathBuf::from(with_ext), plain]
}

#[cfg(not(windows))]
fn candidate_files(dir: &Path, name: &OsStr) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
