//! Path utilities for weft
//!
//! Socket paths follow the label convention: every label names a socket
//! inside a private per-user directory. Config and log locations follow the
//! XDG Base Directory specification.

use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::{Result, WeftError};

/// Application identifier for XDG directories
const APP_NAME: &str = "weft";

/// Label used when neither a path nor a label is given
pub const DEFAULT_LABEL: &str = "default";

/// Overrides the parent of the per-user socket directory
pub const TMPDIR_ENV: &str = "WEFT_TMPDIR";

/// Set inside panes to `<socket>,<server pid>,<session id>`
pub const SESSION_ENV: &str = "WEFT";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

fn current_uid() -> u32 {
    // SAFETY: getuid() is always safe to call
    unsafe { libc::getuid() }
}

/// Per-user socket directory, without creating it
///
/// Location: `$WEFT_TMPDIR/weft-$UID` or `/tmp/weft-$UID`
pub fn socket_dir() -> PathBuf {
    let parent = std::env::var(TMPDIR_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    parent.join(format!("{}-{}", APP_NAME, current_uid()))
}

/// Socket path for the default label, without creating anything
pub fn socket_path() -> PathBuf {
    socket_dir().join(DEFAULT_LABEL)
}

/// Resolve the socket for `label`, creating and checking the per-user
/// directory on the way.
pub fn socket_path_for_label(label: Option<&str>) -> Result<PathBuf> {
    let dir = socket_dir();
    secure_socket_dir(&dir, current_uid())?;
    let resolved = std::fs::canonicalize(&dir).unwrap_or(dir);
    Ok(resolved.join(label.unwrap_or(DEFAULT_LABEL)))
}

/// Create `dir` with mode 0700 if missing and reject it unless it is a
/// directory owned by `uid` with no access for others.
pub fn secure_socket_dir(dir: &Path, uid: u32) -> Result<()> {
    match std::fs::DirBuilder::new().mode(0o700).create(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => {
            return Err(WeftError::FileWrite {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    }

    let meta = std::fs::symlink_metadata(dir).map_err(|e| WeftError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(WeftError::UnsafeSocketDir {
            path: dir.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    if meta.uid() != uid {
        return Err(WeftError::UnsafeSocketDir {
            path: dir.to_path_buf(),
            reason: format!("owned by uid {}, expected {}", meta.uid(), uid),
        });
    }
    if meta.permissions().mode() & 0o007 != 0 {
        return Err(WeftError::UnsafeSocketDir {
            path: dir.to_path_buf(),
            reason: "accessible by other users".into(),
        });
    }
    Ok(())
}

/// Pick the control socket.
///
/// An explicit path wins, then an explicit label. Without either, a client
/// running inside a pane reuses the socket from `$WEFT`, and everything
/// else falls back to the default label.
pub fn resolve_socket(path: Option<PathBuf>, label: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = path {
        return Ok(path);
    }
    if label.is_none() {
        if let Some(inherited) = std::env::var(SESSION_ENV)
            .ok()
            .as_deref()
            .and_then(socket_from_session_env)
        {
            return Ok(inherited);
        }
    }
    socket_path_for_label(label)
}

/// Extract the socket path from a `$WEFT` value.
pub fn socket_from_session_env(value: &str) -> Option<PathBuf> {
    let socket = value.split(',').next()?;
    if socket.is_empty() {
        None
    } else {
        Some(PathBuf::from(socket))
    }
}

/// Get the runtime directory
///
/// Location: `$XDG_RUNTIME_DIR/weft` or the socket directory
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime).join(APP_NAME)
    } else {
        socket_dir()
    }
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/weft` or `~/.config/weft`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config").join(APP_NAME))
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/weft/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/weft` or `~/.local/state/weft`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| home_dir().join(".local").join("state").join(APP_NAME))
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/weft/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
