//! Process environment helpers used while starting a server or client.

use std::ffi::CStr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Shell used when nothing better is available
pub const FALLBACK_SHELL: &str = "/bin/sh";

/// Key binding flavour for the status line and copy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKeys {
    Emacs,
    Vi,
}

impl ModeKeys {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeKeys::Emacs => "emacs",
            ModeKeys::Vi => "vi",
        }
    }
}

/// Choose the shell for new panes.
///
/// `$SHELL` is used if it is acceptable, then the login shell from the
/// password database, then `/bin/sh`.
pub fn default_shell() -> String {
    let progname = std::env::args()
        .next()
        .unwrap_or_else(|| "weft-server".into());

    if let Ok(shell) = std::env::var("SHELL") {
        if check_shell(&shell, &progname) {
            return shell;
        }
    }
    if let Some(shell) = passwd_shell() {
        if check_shell(&shell, &progname) {
            return shell;
        }
    }
    FALLBACK_SHELL.into()
}

/// A shell is acceptable when it is an absolute, executable path that does
/// not point back at this program.
pub fn check_shell(shell: &str, progname: &str) -> bool {
    if !shell.starts_with('/') {
        return false;
    }
    if is_self(shell, progname) {
        return false;
    }
    std::fs::metadata(shell)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn is_self(shell: &str, progname: &str) -> bool {
    let base = |s: &str| -> String {
        Path::new(s)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| s.to_string())
    };
    let progname = progname.trim_start_matches('-');
    base(shell) == base(progname)
}

fn passwd_shell() -> Option<String> {
    // SAFETY: getpwuid returns a pointer into static storage or null; the
    // shell string is copied out before any other passwd call.
    unsafe {
        let pw = libc::getpwuid(libc::getuid());
        if pw.is_null() || (*pw).pw_shell.is_null() {
            return None;
        }
        Some(CStr::from_ptr((*pw).pw_shell).to_string_lossy().into_owned())
    }
}

/// Whether the client terminal should be treated as UTF-8.
pub fn locale_is_utf8() -> bool {
    locale_is_utf8_with(|name| std::env::var(name).ok())
}

/// Running inside a pane always implies UTF-8; otherwise the first set of
/// `LC_ALL`, `LC_CTYPE` and `LANG` decides.
pub fn locale_is_utf8_with<F>(get: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if get(crate::paths::SESSION_ENV).is_some() {
        return true;
    }
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .filter_map(|name| get(name))
        .find(|value| !value.is_empty());
    match locale {
        Some(value) => {
            let upper = value.to_ascii_uppercase();
            upper.contains("UTF-8") || upper.contains("UTF8")
        }
        None => false,
    }
}

/// Key flavour implied by `$VISUAL` or `$EDITOR`, if either is set.
pub fn default_mode_keys() -> Option<ModeKeys> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()?;
    Some(mode_keys_for_editor(&editor))
}

pub fn mode_keys_for_editor(editor: &str) -> ModeKeys {
    let name = editor.rsplit('/').next().unwrap_or(editor);
    if name.contains("vi") {
        ModeKeys::Vi
    } else {
        ModeKeys::Emacs
    }
}

/// Snapshot of the current environment as `(name, value)` pairs.
pub fn environment_snapshot() -> Vec<(String, String)> {
    let mut vars: Vec<_> = std::env::vars().collect();
    if let Ok(cwd) = std::env::current_dir() {
        vars.retain(|(k, _)| k != "PWD");
        vars.push(("PWD".into(), cwd.to_string_lossy().into_owned()));
    }
    vars
}
