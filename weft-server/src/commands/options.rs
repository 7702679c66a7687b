//! Option and hook commands

use crate::hooks::HookKind;
use crate::options::{find_option, OptionScope, OptionTarget, ScopeTarget};
use crate::session::SessionManager;

use super::{CommandError, CommandOutput, Executor, Origin, Reply};

impl Executor {
    /// Table a scope flag and target select
    fn scope_target(
        &self,
        model: &SessionManager,
        origin: &Origin,
        scope: OptionScope,
        target: Option<&str>,
    ) -> Result<ScopeTarget, CommandError> {
        let resolver = self.resolver(model, origin);
        Ok(match scope {
            OptionScope::Server => ScopeTarget::Server,
            OptionScope::Session => ScopeTarget::Session(resolver.session(target)?),
            OptionScope::Window => ScopeTarget::Window(resolver.window(target)?.1),
            OptionScope::Pane => ScopeTarget::Pane(resolver.pane(target)?.2),
        })
    }

    /// Object whose effective value `show-options` reports
    fn option_target(
        &self,
        model: &SessionManager,
        origin: &Origin,
        scope: OptionScope,
        target: Option<&str>,
    ) -> Result<OptionTarget, CommandError> {
        let resolver = self.resolver(model, origin);
        Ok(match scope {
            OptionScope::Server => OptionTarget::server(),
            OptionScope::Session => OptionTarget::session(resolver.session(target)?),
            OptionScope::Window => {
                let (session, window) = resolver.window(target)?;
                OptionTarget::window(session, window)
            }
            OptionScope::Pane => {
                let (session, window, pane) = resolver.pane(target)?;
                OptionTarget::pane(session, window, pane)
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn set_option(
        &mut self,
        model: &mut SessionManager,
        origin: &Origin,
        scope: Option<OptionScope>,
        target: Option<String>,
        unset: bool,
        name: String,
        value: Option<String>,
    ) -> Reply {
        let spec = find_option(&name)
            .ok_or_else(|| CommandError::InvalidArgument(format!("invalid option: {}", name)))?;
        let table = self.scope_target(model, origin, scope.unwrap_or(spec.scope), target.as_deref())?;
        match (unset, value) {
            (true, _) => self.options.unset(&name, table)?,
            (false, Some(value)) => self.options.set_str(&name, &value, table)?,
            (false, None) => {
                return Err(CommandError::InvalidArgument(format!("{}: no value given", name)))
            }
        }
        self.apply_option(model, &name);
        Ok(CommandOutput::empty())
    }

    /// Bring live objects in line with a changed option
    fn apply_option(&mut self, model: &mut SessionManager, name: &str) {
        match name {
            "alternate-screen" => {
                for pane_id in model.pane_ids() {
                    if let Some((session, window, pane)) = model.find_pane(pane_id) {
                        let allow = self.options.flag(
                            name,
                            OptionTarget::pane(session.id(), window.id(), pane_id),
                        );
                        pane.terminal().lock().grid_mut().set_allow_alternate(allow);
                    }
                }
            }
            "window-size" => {
                for session_id in model.session_ids() {
                    if self.fit_session(model, session_id) {
                        self.send_layout(model, session_id);
                    }
                }
            }
            "automatic-rename" | "pane-base-index" => {
                for session_id in model.session_ids() {
                    self.send_layout(model, session_id);
                }
            }
            _ => {}
        }
    }

    pub(super) fn show_options(
        &self,
        model: &SessionManager,
        origin: &Origin,
        scope: Option<OptionScope>,
        target: Option<String>,
        name: Option<String>,
        value_only: bool,
    ) -> Reply {
        let format = |name: &str, value: String| {
            if value_only {
                value
            } else {
                format!("{} {}", name, value)
            }
        };

        let Some(name) = name else {
            let table = self.scope_target(
                model,
                origin,
                scope.unwrap_or(OptionScope::Session),
                target.as_deref(),
            )?;
            let lines = self
                .options
                .list(table)
                .into_iter()
                .map(|(name, value)| format(&name, value.to_string()))
                .collect();
            return Ok(CommandOutput::lines(lines));
        };

        let spec = find_option(&name)
            .ok_or_else(|| CommandError::InvalidArgument(format!("invalid option: {}", name)))?;
        let value = match scope {
            Some(scope) => {
                let table = self.scope_target(model, origin, scope, target.as_deref())?;
                match self.options.get_local(&name, table) {
                    Some(value) => value,
                    None => return Ok(CommandOutput::empty()),
                }
            }
            None => {
                let target = self.option_target(model, origin, spec.scope, target.as_deref())?;
                self.options.get_effective(&name, target)?
            }
        };
        Ok(CommandOutput::line(format(&name, value.to_string())))
    }

    pub(super) fn set_hook(&mut self, kind: HookKind, unset: bool, append: bool, command: Vec<String>) -> Reply {
        if unset {
            self.hooks.clear_commands(kind);
        } else {
            self.hooks.set_command(kind, command, append);
        }
        Ok(CommandOutput::empty())
    }

    pub(super) fn show_hooks(&self) -> Reply {
        let mut lines = Vec::new();
        let mut previous = None;
        let mut index = 0;
        for (kind, argv) in self.hooks.commands() {
            if previous != Some(kind) {
                previous = Some(kind);
                index = 0;
            }
            lines.push(format!("{}[{}] {}", kind, index, argv.join(" ")));
            index += 1;
        }
        Ok(CommandOutput::lines(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::super::exec::tests::Fixture;
    use super::*;

    // ==================== Option Tests ====================

    #[test]
    fn test_window_override_wins_over_global() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-option", "-g", "pane-base-index", "1"], Origin::server())
            .unwrap();
        fx.run_argv(&["set-option", "-w", "pane-base-index", "5"], Origin::server())
            .unwrap();

        let out = fx
            .run_argv(&["show-options", "-v", "pane-base-index"], Origin::server())
            .unwrap();
        assert_eq!(out.lines, vec!["5".to_string()]);
        let out = fx
            .run_argv(&["show-options", "-gv", "pane-base-index"], Origin::server())
            .unwrap();
        assert_eq!(out.lines, vec!["1".to_string()]);

        let out = fx.run_argv(&["list-panes"], Origin::server()).unwrap();
        assert!(out.lines[0].starts_with("5: "), "{}", out.lines[0]);
    }

    #[test]
    fn test_unset_window_override() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-option", "-w", "automatic-rename", "off"], Origin::server())
            .unwrap();
        fx.run_argv(&["set-option", "-wu", "automatic-rename"], Origin::server())
            .unwrap();
        let out = fx
            .run_argv(&["show-options", "-w"], Origin::server())
            .unwrap();
        assert!(out.lines.is_empty(), "{:?}", out.lines);
        let out = fx
            .run_argv(&["show-options", "automatic-rename"], Origin::server())
            .unwrap();
        assert_eq!(out.lines, vec!["automatic-rename on".to_string()]);
    }

    #[test]
    fn test_set_option_rejects_bad_values() {
        let mut fx = Fixture::new("");
        let err = fx
            .run_argv(&["set-option", "-g", "history-limit", "lots"], Origin::server())
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        let err = fx
            .run_argv(&["set-option", "-g", "no-such-option", "1"], Origin::server())
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        let err = fx
            .run_argv(&["set-option", "-p", "base-index", "1"], Origin::server())
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
    }

    #[test]
    fn test_alternate_screen_applied_to_panes() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-option", "-g", "alternate-screen", "off"], Origin::server())
            .unwrap();
        let pane = fx.model.find_pane(fx.pane).unwrap().2;
        pane.terminal().lock().inject("main\x1b[?1049halt");
        let snapshot = pane.terminal().lock().snapshot();
        assert_eq!(snapshot.row_text(0), "mainalt");
    }

    // ==================== Hook Tests ====================

    #[test]
    fn test_set_and_show_hooks() {
        let mut fx = Fixture::new("");
        fx.run_argv(&["set-hook", "pane-created", "select-layout tiled"], Origin::server())
            .unwrap();
        fx.run_argv(
            &["set-hook", "-a", "pane-created", "list-panes"],
            Origin::server(),
        )
        .unwrap();
        fx.run_argv(&["set-hook", "session-closed", "kill-server"], Origin::server())
            .unwrap();

        let out = fx.run_argv(&["show-hooks"], Origin::server()).unwrap();
        assert_eq!(
            out.lines,
            vec![
                "session-closed[0] kill-server".to_string(),
                "pane-created[0] select-layout tiled".to_string(),
                "pane-created[1] list-panes".to_string(),
            ]
        );

        fx.run_argv(&["set-hook", "-u", "pane-created"], Origin::server())
            .unwrap();
        let out = fx.run_argv(&["show-hooks"], Origin::server()).unwrap();
        assert_eq!(out.lines, vec!["session-closed[0] kill-server".to_string()]);
    }
}
