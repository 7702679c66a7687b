//! Static option schema

use std::fmt;
use std::str::FromStr;

use super::{OptionError, OptionValue};

/// Most specific table an option may be set in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionScope {
    Server,
    Session,
    Window,
    Pane,
}

impl OptionScope {
    pub fn name(&self) -> &'static str {
        match self {
            OptionScope::Server => "server",
            OptionScope::Session => "session",
            OptionScope::Window => "window",
            OptionScope::Pane => "pane",
        }
    }
}

impl fmt::Display for OptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Number { min: i64, max: i64 },
    Flag,
    Choice(&'static [&'static str]),
    Array,
}

/// Schema default, materialized into the server table at startup
#[derive(Debug, Clone, Copy)]
pub enum OptionDefault {
    String(&'static str),
    Number(i64),
    Flag(bool),
    Array(&'static [&'static str]),
}

impl OptionDefault {
    pub fn to_value(self) -> OptionValue {
        match self {
            OptionDefault::String(s) => OptionValue::String(s.into()),
            OptionDefault::Number(n) => OptionValue::Number(n),
            OptionDefault::Flag(b) => OptionValue::Flag(b),
            OptionDefault::Array(items) => {
                OptionValue::Array(items.iter().map(|s| s.to_string()).collect())
            }
        }
    }
}

#[derive(Debug)]
pub struct OptionSpec {
    pub name: &'static str,
    pub scope: OptionScope,
    pub kind: OptionKind,
    pub default: OptionDefault,
    pub description: &'static str,
}

const KEY_CHOICES: &[&str] = &["emacs", "vi"];
const WINDOW_SIZE_CHOICES: &[&str] = &["largest", "smallest", "manual", "latest"];

pub static OPTION_TABLE: &[OptionSpec] = &[
    OptionSpec {
        name: "exit-empty",
        scope: OptionScope::Server,
        kind: OptionKind::Flag,
        default: OptionDefault::Flag(true),
        description: "Exit the server when no sessions remain",
    },
    OptionSpec {
        name: "base-index",
        scope: OptionScope::Session,
        kind: OptionKind::Number { min: 0, max: i32::MAX as i64 },
        default: OptionDefault::Number(0),
        description: "First index used for new windows",
    },
    OptionSpec {
        name: "default-command",
        scope: OptionScope::Session,
        kind: OptionKind::String,
        default: OptionDefault::String(""),
        description: "Command run in new panes; empty starts the default shell",
    },
    OptionSpec {
        name: "default-shell",
        scope: OptionScope::Session,
        kind: OptionKind::String,
        default: OptionDefault::String(weft_utils::env::FALLBACK_SHELL),
        description: "Shell used for new panes",
    },
    OptionSpec {
        name: "default-terminal",
        scope: OptionScope::Session,
        kind: OptionKind::String,
        default: OptionDefault::String(crate::pty::DEFAULT_TERM),
        description: "TERM value inside panes",
    },
    OptionSpec {
        name: "destroy-unattached",
        scope: OptionScope::Session,
        kind: OptionKind::Flag,
        default: OptionDefault::Flag(false),
        description: "Destroy the session when its last client detaches",
    },
    OptionSpec {
        name: "history-limit",
        scope: OptionScope::Session,
        kind: OptionKind::Number { min: 0, max: i32::MAX as i64 },
        default: OptionDefault::Number(crate::grid::DEFAULT_HISTORY_LIMIT as i64),
        description: "Scrollback lines kept by new panes",
    },
    OptionSpec {
        name: "status-keys",
        scope: OptionScope::Session,
        kind: OptionKind::Choice(KEY_CHOICES),
        default: OptionDefault::String("emacs"),
        description: "Key flavour of the command prompt",
    },
    OptionSpec {
        name: "update-environment",
        scope: OptionScope::Session,
        kind: OptionKind::Array,
        default: OptionDefault::Array(&[
            "DISPLAY",
            "KRB5CCNAME",
            "SSH_ASKPASS",
            "SSH_AUTH_SOCK",
            "SSH_AGENT_PID",
            "SSH_CONNECTION",
            "WINDOWID",
            "XAUTHORITY",
        ]),
        description: "Client variables copied into new panes",
    },
    OptionSpec {
        name: "automatic-rename",
        scope: OptionScope::Window,
        kind: OptionKind::Flag,
        default: OptionDefault::Flag(true),
        description: "Name the window after its active pane's title",
    },
    OptionSpec {
        name: "mode-keys",
        scope: OptionScope::Window,
        kind: OptionKind::Choice(KEY_CHOICES),
        default: OptionDefault::String("emacs"),
        description: "Key flavour of copy mode",
    },
    OptionSpec {
        name: "pane-base-index",
        scope: OptionScope::Window,
        kind: OptionKind::Number { min: 0, max: u16::MAX as i64 },
        default: OptionDefault::Number(0),
        description: "First index used for panes",
    },
    OptionSpec {
        name: "window-size",
        scope: OptionScope::Window,
        kind: OptionKind::Choice(WINDOW_SIZE_CHOICES),
        default: OptionDefault::String("latest"),
        description: "Which attached client decides the window size",
    },
    OptionSpec {
        name: "alternate-screen",
        scope: OptionScope::Pane,
        kind: OptionKind::Flag,
        default: OptionDefault::Flag(true),
        description: "Allow programs to use the alternate screen",
    },
    OptionSpec {
        name: "remain-on-exit",
        scope: OptionScope::Pane,
        kind: OptionKind::Flag,
        default: OptionDefault::Flag(false),
        description: "Keep panes whose process has exited",
    },
];

/// Look up an option by exact name
pub fn find_option(name: &str) -> Option<&'static OptionSpec> {
    OPTION_TABLE.iter().find(|spec| spec.name == name)
}

impl OptionSpec {
    /// Whether the option may be stored in a table of `scope`. Options can
    /// always be set less specifically than their own scope.
    pub fn allows(&self, scope: OptionScope) -> bool {
        scope <= self.scope
    }

    /// Check that `value` has the right type and is within range.
    pub fn validate(&self, value: &OptionValue) -> Result<(), OptionError> {
        let invalid = |reason: String| OptionError::InvalidValue {
            name: self.name.to_string(),
            reason,
        };
        match (self.kind, value) {
            (OptionKind::String, OptionValue::String(_)) => Ok(()),
            (OptionKind::Flag, OptionValue::Flag(_)) => Ok(()),
            (OptionKind::Array, OptionValue::Array(_)) => Ok(()),
            (OptionKind::Number { min, max }, OptionValue::Number(n)) => {
                if *n < min || *n > max {
                    Err(invalid(format!("{} is out of range {}..={}", n, min, max)))
                } else {
                    Ok(())
                }
            }
            (OptionKind::Choice(choices), OptionValue::String(s)) => {
                if choices.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(invalid(format!(
                        "{} is not one of: {}",
                        s,
                        choices.join(", ")
                    )))
                }
            }
            (_, other) => Err(invalid(format!("wrong type: {}", other.type_name()))),
        }
    }

    /// Parse the textual form of a value for this option.
    pub fn parse_value(&self, raw: &str) -> Result<OptionValue, OptionError> {
        let value = match self.kind {
            OptionKind::String | OptionKind::Choice(_) => OptionValue::String(raw.to_string()),
            OptionKind::Number { .. } => {
                let n = i64::from_str(raw).map_err(|_| OptionError::InvalidValue {
                    name: self.name.to_string(),
                    reason: format!("not a number: {}", raw),
                })?;
                OptionValue::Number(n)
            }
            OptionKind::Flag => OptionValue::Flag(parse_flag(raw).ok_or_else(|| {
                OptionError::InvalidValue {
                    name: self.name.to_string(),
                    reason: format!("not a flag: {}", raw),
                }
            })?),
            OptionKind::Array => {
                OptionValue::Array(raw.split_whitespace().map(str::to_string).collect())
            }
        };
        self.validate(&value)?;
        Ok(value)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    // ==================== Table Tests ====================

    #[test]
    fn test_names_unique() {
        let names: HashSet<_> = OPTION_TABLE.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), OPTION_TABLE.len());
    }

    #[test]
    fn test_defaults_validate() {
        for spec in OPTION_TABLE {
            assert!(
                spec.validate(&spec.default.to_value()).is_ok(),
                "default of {} is invalid",
                spec.name
            );
        }
    }

    #[test]
    fn test_find_option() {
        assert_eq!(find_option("history-limit").unwrap().scope, OptionScope::Session);
        assert!(find_option("no-such-option").is_none());
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_scope_compatibility() {
        let pane_opt = find_option("remain-on-exit").unwrap();
        assert!(pane_opt.allows(OptionScope::Server));
        assert!(pane_opt.allows(OptionScope::Pane));

        let session_opt = find_option("base-index").unwrap();
        assert!(session_opt.allows(OptionScope::Session));
        assert!(!session_opt.allows(OptionScope::Window));

        let server_opt = find_option("exit-empty").unwrap();
        assert!(!server_opt.allows(OptionScope::Session));
    }

    #[test]
    fn test_parse_number_range() {
        let spec = find_option("pane-base-index").unwrap();
        assert_eq!(spec.parse_value("1").unwrap(), OptionValue::Number(1));
        assert!(spec.parse_value("-1").is_err());
        assert!(spec.parse_value("70000").is_err());
        assert!(spec.parse_value("one").is_err());
    }

    #[test]
    fn test_parse_flag() {
        let spec = find_option("remain-on-exit").unwrap();
        assert_eq!(spec.parse_value("on").unwrap(), OptionValue::Flag(true));
        assert_eq!(spec.parse_value("OFF").unwrap(), OptionValue::Flag(false));
        assert!(spec.parse_value("maybe").is_err());
    }

    #[test]
    fn test_parse_choice() {
        let spec = find_option("window-size").unwrap();
        assert!(spec.parse_value("smallest").is_ok());
        assert!(spec.parse_value("tiny").is_err());
    }

    #[test]
    fn test_parse_array() {
        let spec = find_option("update-environment").unwrap();
        assert_eq!(
            spec.parse_value("DISPLAY  TERM").unwrap(),
            OptionValue::Array(vec!["DISPLAY".into(), "TERM".into()])
        );
    }

    #[test]
    fn test_wrong_type_rejected() {
        let spec = find_option("history-limit").unwrap();
        assert!(spec.validate(&OptionValue::Flag(true)).is_err());
    }
}
