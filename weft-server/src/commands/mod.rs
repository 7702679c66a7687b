//! Commands and the queue that executes them
//!
//! Every change to the session tree goes through here: clients and hooks
//! submit [`Command`]s to the [`CommandQueue`], and a single worker runs them
//! one at a time against the model.

mod args;
mod client;
mod exec;
pub mod keys;
mod options;
mod pane;
mod queue;
mod session;
pub mod target;
mod window;

use thiserror::Error;
use weft_protocol::{ErrorCode, PaneId, SessionId, SplitDirection};
use weft_utils::WeftError;

use crate::hooks::HookKind;
use crate::options::{OptionError, OptionScope};
use crate::registry::ClientId;
use crate::session::{Direction, LayoutError, LayoutPreset};

pub use args::{split_command_line, Args};
pub use exec::Executor;
pub use queue::{run_worker, CommandQueue, Origin, QueuedCommand, Reply};

/// Failure of a command. The model is left unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("can't find session: {0}")]
    SessionNotFound(String),

    #[error("can't find window: {0}")]
    WindowNotFound(String),

    #[error("can't find pane: {0}")]
    PaneNotFound(String),

    #[error("duplicate session: {0}")]
    SessionExists(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Resource(String),
}

impl CommandError {
    /// Wire error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CommandError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            CommandError::WindowNotFound(_) => ErrorCode::WindowNotFound,
            CommandError::PaneNotFound(_) => ErrorCode::PaneNotFound,
            CommandError::SessionExists(_) => ErrorCode::SessionExists,
            CommandError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            CommandError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            CommandError::UnknownCommand(_) => ErrorCode::UnknownCommand,
            CommandError::Resource(_) => ErrorCode::ResourceError,
        }
    }
}

impl From<OptionError> for CommandError {
    fn from(e: OptionError) -> Self {
        CommandError::InvalidArgument(e.to_string())
    }
}

impl From<LayoutError> for CommandError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::PaneNotFound(id) => CommandError::PaneNotFound(id.to_string()),
            LayoutError::TooSmall => CommandError::Resource("no space for new pane".into()),
            LayoutError::LastPane => CommandError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<WeftError> for CommandError {
    fn from(e: WeftError) -> Self {
        match e {
            WeftError::SessionNotFound(s) => CommandError::SessionNotFound(s),
            WeftError::WindowNotFound(s) => CommandError::WindowNotFound(s),
            WeftError::PaneNotFound(s) => CommandError::PaneNotFound(s),
            WeftError::SessionExists(s) => CommandError::SessionExists(s),
            other => CommandError::Resource(other.to_string()),
        }
    }
}

/// Lines printed by a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub lines: Vec<String>,
}

impl CommandOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn line(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
        }
    }

    pub fn lines(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

/// Window movement for `select-window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStep {
    Target,
    Last,
    Next,
    Previous,
}

/// Size of the new pane for `split-window -l`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSize {
    Cells(u16),
    Percent(u16),
}

/// Which panes `list-panes` covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Window,
    Session,
    Server,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NewSession {
        name: Option<String>,
        window_name: Option<String>,
        detached: bool,
        print: bool,
        cwd: Option<String>,
        width: Option<u16>,
        height: Option<u16>,
        command: Option<String>,
    },
    KillSession {
        target: Option<String>,
    },
    RenameSession {
        target: Option<String>,
        name: String,
    },
    HasSession {
        target: Option<String>,
    },
    ListSessions,
    NewWindow {
        target: Option<String>,
        name: Option<String>,
        detached: bool,
        print: bool,
        cwd: Option<String>,
        command: Option<String>,
    },
    KillWindow {
        target: Option<String>,
    },
    RenameWindow {
        target: Option<String>,
        name: String,
    },
    SelectWindow {
        target: Option<String>,
        step: WindowStep,
    },
    ListWindows {
        target: Option<String>,
        all: bool,
    },
    SplitWindow {
        target: Option<String>,
        direction: SplitDirection,
        before: bool,
        detached: bool,
        print: bool,
        size: Option<SplitSize>,
        cwd: Option<String>,
        command: Option<String>,
    },
    KillPane {
        target: Option<String>,
        others: bool,
    },
    SelectPane {
        target: Option<String>,
        direction: Option<Direction>,
        last: bool,
    },
    SwapPane {
        source: Option<String>,
        target: Option<String>,
        /// Swap with the previous (`-U`) or next (`-D`) pane instead
        neighbour: Option<bool>,
        detached: bool,
    },
    ResizePane {
        target: Option<String>,
        direction: Option<Direction>,
        amount: u16,
        width: Option<u16>,
        height: Option<u16>,
    },
    SelectLayout {
        target: Option<String>,
        preset: LayoutPreset,
    },
    ListPanes {
        target: Option<String>,
        scope: ListScope,
    },
    ResizeWindow {
        target: Option<String>,
        width: Option<u16>,
        height: Option<u16>,
        automatic: bool,
    },
    SendKeys {
        target: Option<String>,
        literal: bool,
        keys: Vec<String>,
    },
    SetOption {
        /// Table to write; None uses the option's own scope
        scope: Option<OptionScope>,
        target: Option<String>,
        unset: bool,
        name: String,
        value: Option<String>,
    },
    ShowOptions {
        scope: Option<OptionScope>,
        target: Option<String>,
        name: Option<String>,
        value_only: bool,
    },
    SetHook {
        kind: HookKind,
        unset: bool,
        append: bool,
        command: Vec<String>,
    },
    ShowHooks,
    DetachClient {
        client: Option<String>,
        session: Option<String>,
        others: bool,
    },
    ListClients {
        target: Option<String>,
    },
    KillServer,

    // Lifecycle commands queued by the server itself
    Attach {
        target: Option<String>,
        create: bool,
    },
    ClientDetached {
        client: ClientId,
        session: SessionId,
    },
    ClientResized {
        client: ClientId,
        cols: u16,
        rows: u16,
    },
    PaneExited {
        pane: PaneId,
        status: Option<i32>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::NewSession { .. } => "new-session",
            Command::KillSession { .. } => "kill-session",
            Command::RenameSession { .. } => "rename-session",
            Command::HasSession { .. } => "has-session",
            Command::ListSessions => "list-sessions",
            Command::NewWindow { .. } => "new-window",
            Command::KillWindow { .. } => "kill-window",
            Command::RenameWindow { .. } => "rename-window",
            Command::SelectWindow { .. } => "select-window",
            Command::ListWindows { .. } => "list-windows",
            Command::SplitWindow { .. } => "split-window",
            Command::KillPane { .. } => "kill-pane",
            Command::SelectPane { .. } => "select-pane",
            Command::SwapPane { .. } => "swap-pane",
            Command::ResizePane { .. } => "resize-pane",
            Command::SelectLayout { .. } => "select-layout",
            Command::ListPanes { .. } => "list-panes",
            Command::ResizeWindow { .. } => "resize-window",
            Command::SendKeys { .. } => "send-keys",
            Command::SetOption { .. } => "set-option",
            Command::ShowOptions { .. } => "show-options",
            Command::SetHook { .. } => "set-hook",
            Command::ShowHooks => "show-hooks",
            Command::DetachClient { .. } => "detach-client",
            Command::ListClients { .. } => "list-clients",
            Command::KillServer => "kill-server",
            Command::Attach { .. } => "attach",
            Command::ClientDetached { .. } => "client-detached",
            Command::ClientResized { .. } => "client-resized",
            Command::PaneExited { .. } => "pane-exited",
        }
    }
}

/// Registration entry of a user-facing command
pub struct CommandSpec {
    pub name: &'static str,
    pub alias: Option<&'static str>,
    pub usage: &'static str,
    /// getopt template, a letter followed by `:` takes a value
    pub flags: &'static str,
    pub min_args: usize,
    /// None for no limit
    pub max_args: Option<usize>,
    /// Changes the model; refused for read-only clients
    pub mutates: bool,
    pub parse: fn(Args) -> Result<Command, CommandError>,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("mutates", &self.mutates)
            .finish()
    }
}

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "new-session",
        alias: Some("new"),
        usage: "new-session [-dP] [-c start-directory] [-n window-name] [-s session-name] [-x width] [-y height] [shell-command]",
        flags: "c:dn:Ps:x:y:",
        min_args: 0,
        max_args: None,
        mutates: true,
        parse: parse_new_session,
    },
    CommandSpec {
        name: "kill-session",
        alias: None,
        usage: "kill-session [-t target-session]",
        flags: "t:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| Ok(Command::KillSession { target: args.owned('t') }),
    },
    CommandSpec {
        name: "rename-session",
        alias: Some("rename"),
        usage: "rename-session [-t target-session] new-name",
        flags: "t:",
        min_args: 1,
        max_args: Some(1),
        mutates: true,
        parse: |args| {
            Ok(Command::RenameSession {
                target: args.owned('t'),
                name: first_value(args),
            })
        },
    },
    CommandSpec {
        name: "has-session",
        alias: Some("has"),
        usage: "has-session [-t target-session]",
        flags: "t:",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |args| Ok(Command::HasSession { target: args.owned('t') }),
    },
    CommandSpec {
        name: "list-sessions",
        alias: Some("ls"),
        usage: "list-sessions",
        flags: "",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |_| Ok(Command::ListSessions),
    },
    CommandSpec {
        name: "new-window",
        alias: Some("neww"),
        usage: "new-window [-dP] [-c start-directory] [-n window-name] [-t target-session] [shell-command]",
        flags: "c:dn:Pt:",
        min_args: 0,
        max_args: None,
        mutates: true,
        parse: |args| {
            Ok(Command::NewWindow {
                target: args.owned('t'),
                name: args.owned('n'),
                detached: args.has('d'),
                print: args.has('P'),
                cwd: args.owned('c'),
                command: shell_command(&args),
            })
        },
    },
    CommandSpec {
        name: "kill-window",
        alias: Some("killw"),
        usage: "kill-window [-t target-window]",
        flags: "t:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| Ok(Command::KillWindow { target: args.owned('t') }),
    },
    CommandSpec {
        name: "rename-window",
        alias: Some("renamew"),
        usage: "rename-window [-t target-window] new-name",
        flags: "t:",
        min_args: 1,
        max_args: Some(1),
        mutates: true,
        parse: |args| {
            Ok(Command::RenameWindow {
                target: args.owned('t'),
                name: first_value(args),
            })
        },
    },
    CommandSpec {
        name: "select-window",
        alias: Some("selectw"),
        usage: "select-window [-lnp] [-t target-window]",
        flags: "lnpt:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: parse_select_window,
    },
    CommandSpec {
        name: "list-windows",
        alias: Some("lsw"),
        usage: "list-windows [-a] [-t target-session]",
        flags: "at:",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |args| {
            Ok(Command::ListWindows {
                target: args.owned('t'),
                all: args.has('a'),
            })
        },
    },
    CommandSpec {
        name: "split-window",
        alias: Some("splitw"),
        usage: "split-window [-bdhvP] [-c start-directory] [-l size] [-t target-pane] [shell-command]",
        flags: "bc:dhl:Pt:v",
        min_args: 0,
        max_args: None,
        mutates: true,
        parse: parse_split_window,
    },
    CommandSpec {
        name: "kill-pane",
        alias: Some("killp"),
        usage: "kill-pane [-a] [-t target-pane]",
        flags: "at:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| {
            Ok(Command::KillPane {
                target: args.owned('t'),
                others: args.has('a'),
            })
        },
    },
    CommandSpec {
        name: "select-pane",
        alias: Some("selectp"),
        usage: "select-pane [-DLlRU] [-t target-pane]",
        flags: "DLlRUt:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| {
            Ok(Command::SelectPane {
                direction: direction_flag(&args),
                last: args.has('l'),
                target: args.owned('t'),
            })
        },
    },
    CommandSpec {
        name: "swap-pane",
        alias: Some("swapp"),
        usage: "swap-pane [-dDU] [-s src-pane] [-t dst-pane]",
        flags: "dDs:t:U",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| {
            let neighbour = if args.has('U') {
                Some(false)
            } else if args.has('D') {
                Some(true)
            } else {
                None
            };
            Ok(Command::SwapPane {
                source: args.owned('s'),
                target: args.owned('t'),
                neighbour,
                detached: args.has('d'),
            })
        },
    },
    CommandSpec {
        name: "resize-pane",
        alias: Some("resizep"),
        usage: "resize-pane [-DLRU] [-t target-pane] [-x width] [-y height] [adjustment]",
        flags: "DLRt:Ux:y:",
        min_args: 0,
        max_args: Some(1),
        mutates: true,
        parse: parse_resize_pane,
    },
    CommandSpec {
        name: "select-layout",
        alias: Some("selectl"),
        usage: "select-layout [-t target-window] layout-name",
        flags: "t:",
        min_args: 1,
        max_args: Some(1),
        mutates: true,
        parse: |args| {
            let target = args.owned('t');
            let preset = first_value(args)
                .parse()
                .map_err(CommandError::InvalidArgument)?;
            Ok(Command::SelectLayout { target, preset })
        },
    },
    CommandSpec {
        name: "list-panes",
        alias: Some("lsp"),
        usage: "list-panes [-as] [-t target-window]",
        flags: "ast:",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |args| {
            let scope = if args.has('a') {
                ListScope::Server
            } else if args.has('s') {
                ListScope::Session
            } else {
                ListScope::Window
            };
            Ok(Command::ListPanes {
                target: args.owned('t'),
                scope,
            })
        },
    },
    CommandSpec {
        name: "resize-window",
        alias: Some("resizew"),
        usage: "resize-window [-A] [-t target-window] [-x width] [-y height]",
        flags: "At:x:y:",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |args| {
            let width = args.number('x')?;
            let height = args.number('y')?;
            if !args.has('A') && width.is_none() && height.is_none() {
                return Err(CommandError::InvalidArgument(
                    "resize-window: -A, -x or -y required".into(),
                ));
            }
            Ok(Command::ResizeWindow {
                target: args.owned('t'),
                width,
                height,
                automatic: args.has('A'),
            })
        },
    },
    CommandSpec {
        name: "send-keys",
        alias: Some("send"),
        usage: "send-keys [-l] [-t target-pane] key ...",
        flags: "lt:",
        min_args: 0,
        max_args: None,
        mutates: true,
        parse: |args| {
            Ok(Command::SendKeys {
                target: args.owned('t'),
                literal: args.has('l'),
                keys: args.into_values(),
            })
        },
    },
    CommandSpec {
        name: "set-option",
        alias: Some("set"),
        usage: "set-option [-gpswu] [-t target] option [value]",
        flags: "gpst:uw",
        min_args: 1,
        max_args: Some(2),
        mutates: true,
        parse: |args| {
            let scope = scope_flag(&args);
            let unset = args.has('u');
            let target = args.owned('t');
            let mut values = args.into_values().into_iter();
            let name = values.next().unwrap_or_default();
            let value = values.next();
            if !unset && value.is_none() {
                return Err(CommandError::InvalidArgument(format!("{}: no value given", name)));
            }
            Ok(Command::SetOption {
                scope,
                target,
                unset,
                name,
                value,
            })
        },
    },
    CommandSpec {
        name: "show-options",
        alias: Some("show"),
        usage: "show-options [-gpsvw] [-t target] [option]",
        flags: "gpst:vw",
        min_args: 0,
        max_args: Some(1),
        mutates: false,
        parse: |args| {
            Ok(Command::ShowOptions {
                scope: scope_flag(&args),
                target: args.owned('t'),
                value_only: args.has('v'),
                name: args.into_values().into_iter().next(),
            })
        },
    },
    CommandSpec {
        name: "set-hook",
        alias: None,
        usage: "set-hook [-agu] hook-name [command]",
        flags: "agu",
        min_args: 1,
        max_args: None,
        mutates: true,
        parse: parse_set_hook,
    },
    CommandSpec {
        name: "show-hooks",
        alias: None,
        usage: "show-hooks [-g]",
        flags: "g",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |_| Ok(Command::ShowHooks),
    },
    CommandSpec {
        name: "detach-client",
        alias: Some("detach"),
        usage: "detach-client [-a] [-s target-session] [-t target-client]",
        flags: "as:t:",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |args| {
            Ok(Command::DetachClient {
                client: args.owned('t'),
                session: args.owned('s'),
                others: args.has('a'),
            })
        },
    },
    CommandSpec {
        name: "list-clients",
        alias: Some("lsc"),
        usage: "list-clients [-t target-session]",
        flags: "t:",
        min_args: 0,
        max_args: Some(0),
        mutates: false,
        parse: |args| Ok(Command::ListClients { target: args.owned('t') }),
    },
    CommandSpec {
        name: "kill-server",
        alias: None,
        usage: "kill-server",
        flags: "",
        min_args: 0,
        max_args: Some(0),
        mutates: true,
        parse: |_| Ok(Command::KillServer),
    },
];

/// Look up a command by name or alias, then by unique name prefix
pub fn find_command(name: &str) -> Result<&'static CommandSpec, CommandError> {
    if let Some(spec) = COMMANDS
        .iter()
        .find(|spec| spec.name == name || spec.alias == Some(name))
    {
        return Ok(spec);
    }
    let mut matches = COMMANDS.iter().filter(|spec| spec.name.starts_with(name));
    match (matches.next(), matches.next()) {
        (Some(spec), None) if !name.is_empty() => Ok(spec),
        (Some(_), Some(_)) => Err(CommandError::UnknownCommand(format!("ambiguous command: {}", name))),
        _ => Err(CommandError::UnknownCommand(name.to_string())),
    }
}

/// Parse a command line into its registration entry and command
pub fn parse(argv: &[String]) -> Result<(&'static CommandSpec, Command), CommandError> {
    let (name, rest) = argv
        .split_first()
        .ok_or_else(|| CommandError::InvalidArgument("empty command".into()))?;
    let spec = find_command(name)?;
    let args = Args::parse(spec.name, rest, spec.flags)?;

    let count = args.values().len();
    if count < spec.min_args || spec.max_args.is_some_and(|max| count > max) {
        return Err(CommandError::InvalidArgument(format!("usage: {}", spec.usage)));
    }
    Ok((spec, (spec.parse)(args)?))
}

fn first_value(args: Args) -> String {
    args.into_values().into_iter().next().unwrap_or_default()
}

fn shell_command(args: &Args) -> Option<String> {
    let words = args.values();
    (!words.is_empty()).then(|| words.join(" "))
}

fn direction_flag(args: &Args) -> Option<Direction> {
    [
        ('L', Direction::Left),
        ('R', Direction::Right),
        ('U', Direction::Up),
        ('D', Direction::Down),
    ]
    .into_iter()
    .find(|(flag, _)| args.has(*flag))
    .map(|(_, dir)| dir)
}

fn scope_flag(args: &Args) -> Option<OptionScope> {
    if args.has('p') {
        Some(OptionScope::Pane)
    } else if args.has('w') {
        Some(OptionScope::Window)
    } else if args.has('g') || args.has('s') {
        Some(OptionScope::Server)
    } else {
        None
    }
}

fn parse_new_session(args: Args) -> Result<Command, CommandError> {
    Ok(Command::NewSession {
        name: args.owned('s'),
        window_name: args.owned('n'),
        detached: args.has('d'),
        print: args.has('P'),
        cwd: args.owned('c'),
        width: args.number('x')?,
        height: args.number('y')?,
        command: shell_command(&args),
    })
}

fn parse_select_window(args: Args) -> Result<Command, CommandError> {
    let step = if args.has('l') {
        WindowStep::Last
    } else if args.has('n') {
        WindowStep::Next
    } else if args.has('p') {
        WindowStep::Previous
    } else {
        WindowStep::Target
    };
    Ok(Command::SelectWindow {
        target: args.owned('t'),
        step,
    })
}

fn parse_split_window(args: Args) -> Result<Command, CommandError> {
    let size = match args.value('l') {
        None => None,
        Some(raw) => Some(parse_split_size(raw)?),
    };
    // -h puts panes side by side
    let direction = if args.has('h') {
        SplitDirection::Horizontal
    } else {
        SplitDirection::Vertical
    };
    Ok(Command::SplitWindow {
        target: args.owned('t'),
        direction,
        before: args.has('b'),
        detached: args.has('d'),
        print: args.has('P'),
        size,
        cwd: args.owned('c'),
        command: shell_command(&args),
    })
}

fn parse_split_size(raw: &str) -> Result<SplitSize, CommandError> {
    let invalid = || CommandError::InvalidArgument(format!("invalid size: {}", raw));
    match raw.strip_suffix('%') {
        Some(percent) => {
            let value: u16 = percent.parse().map_err(|_| invalid())?;
            if value == 0 || value >= 100 {
                return Err(invalid());
            }
            Ok(SplitSize::Percent(value))
        }
        None => {
            let value: u16 = raw.parse().map_err(|_| invalid())?;
            if value == 0 {
                return Err(invalid());
            }
            Ok(SplitSize::Cells(value))
        }
    }
}

fn parse_resize_pane(args: Args) -> Result<Command, CommandError> {
    let amount = match args.values().first() {
        Some(raw) => raw
            .parse()
            .map_err(|_| CommandError::InvalidArgument(format!("invalid adjustment: {}", raw)))?,
        None => 1,
    };
    Ok(Command::ResizePane {
        direction: direction_flag(&args),
        width: args.number('x')?,
        height: args.number('y')?,
        target: args.owned('t'),
        amount,
    })
}

fn parse_set_hook(args: Args) -> Result<Command, CommandError> {
    let unset = args.has('u');
    let append = args.has('a');
    let mut values = args.into_values().into_iter();
    let name = values.next().unwrap_or_default();
    let kind: HookKind = name
        .parse()
        .map_err(|_| CommandError::InvalidArgument(format!("unknown hook: {}", name)))?;

    let rest: Vec<String> = values.collect();
    let command = match rest.as_slice() {
        [line] => split_command_line(line)?,
        _ => rest,
    };
    if unset != command.is_empty() {
        return Err(CommandError::InvalidArgument(if unset {
            "set-hook -u takes no command".into()
        } else {
            format!("{}: no command given", name)
        }));
    }
    if !command.is_empty() {
        find_command(&command[0])?;
    }
    Ok(Command::SetHook {
        kind,
        unset,
        append,
        command,
    })
}
