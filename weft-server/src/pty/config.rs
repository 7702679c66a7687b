//! PTY spawn configuration

use std::collections::HashMap;
use std::path::PathBuf;

/// Terminal type advertised to programs running in panes
pub const DEFAULT_TERM: &str = "screen-256color";

/// Configuration for spawning a pane process
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Program to execute
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Variables set in the child environment
    pub env: HashMap<String, String>,
    /// Variables removed from the child environment
    pub env_remove: Vec<String>,
    /// Initial terminal size (cols, rows)
    pub size: (u16, u16),
}

impl Default for PtyConfig {
    fn default() -> Self {
        let mut env = HashMap::new();
        env.insert("TERM".to_string(), DEFAULT_TERM.to_string());
        Self {
            command: weft_utils::env::default_shell(),
            args: Vec::new(),
            cwd: None,
            env,
            env_remove: Vec::new(),
            size: (80, 24),
        }
    }
}

impl PtyConfig {
    /// Interactive shell
    pub fn shell(shell: impl Into<String>) -> Self {
        Self {
            command: shell.into(),
            ..Default::default()
        }
    }

    /// Run `command_line` through `shell -c`, as `default-command` and
    /// `new-window <command>` do.
    pub fn shell_command(shell: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            command: shell.into(),
            ..Default::default()
        }
        .with_arg("-c")
        .with_arg(command_line)
    }

    /// Run a program directly
    pub fn command(cmd: impl Into<String>) -> Self {
        Self {
            command: cmd.into(),
            ..Default::default()
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn without_env(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Set initial size; zero dimensions are raised to 1
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = (cols.max(1), rows.max(1));
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sets_term() {
        let config = PtyConfig::command("true");
        assert_eq!(config.env.get("TERM").map(String::as_str), Some(DEFAULT_TERM));
        assert_eq!(config.size, (80, 24));
    }

    #[test]
    fn test_shell_command_uses_dash_c() {
        let config = PtyConfig::shell_command("/bin/sh", "echo hi; exit 3");
        assert_eq!(config.command, "/bin/sh");
        assert_eq!(config.args, vec!["-c", "echo hi; exit 3"]);
    }

    #[test]
    fn test_shell_has_no_args() {
        let config = PtyConfig::shell("/usr/bin/zsh");
        assert_eq!(config.command, "/usr/bin/zsh");
        assert!(config.args.is_empty());
    }

    #[test]
    fn test_builder_chain() {
        let config = PtyConfig::command("cat")
            .with_cwd("/tmp")
            .with_env("A", "1")
            .with_env("B", "2")
            .with_env("A", "3")
            .without_env("COLUMNS")
            .with_size(0, 10);

        assert_eq!(config.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(config.env.get("A").map(String::as_str), Some("3"));
        assert_eq!(config.env.get("B").map(String::as_str), Some("2"));
        assert_eq!(config.env_remove, vec!["COLUMNS"]);
        assert_eq!(config.size, (1, 10));
    }
}
