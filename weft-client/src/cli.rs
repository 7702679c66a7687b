//! Command-line argument parsing for the weft client

use clap::Parser;
use std::path::PathBuf;

use weft_utils::paths::resolve_socket;
use weft_utils::Result;

use crate::connection::Endpoint;

/// weft - terminal multiplexer client
#[derive(Parser, Debug)]
#[command(name = "weft", author, version, about, long_about = None)]
pub struct Args {
    /// Control socket path
    #[arg(long, short = 'S', env = "WEFT_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Socket label inside the per-user socket directory
    #[arg(short = 'L')]
    pub label: Option<String>,

    /// Server address (tcp://host:port or unix://path), overrides --socket
    #[arg(long, env = "WEFT_ADDR")]
    pub addr: Option<String>,

    /// Access token presented to a relay listener
    #[arg(long, env = "WEFT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Fail instead of starting a server when none is running
    #[arg(long, default_value_t = false)]
    pub no_auto_start: bool,

    /// How long to wait for an auto-started server, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub server_timeout: u64,

    /// Command to run, e.g. `attach -t work` or `split-window -h`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// What the invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Attach and take over the terminal
    Attach { target: Option<String>, create: bool },
    /// Run a command that attaches this client, then take over the terminal
    Interactive(Vec<String>),
    /// Run one command and print its output
    Command(Vec<String>),
}

impl Mode {
    /// Whether a missing local server should be started for this mode
    pub fn starts_server(&self) -> bool {
        match self {
            Mode::Attach { create, .. } => *create,
            Mode::Interactive(_) => true,
            Mode::Command(_) => false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, Mode::Command(_))
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn auto_start_enabled(&self) -> bool {
        !self.no_auto_start
    }

    /// Where to connect
    pub fn endpoint(&self) -> Result<Endpoint> {
        match &self.addr {
            Some(addr) => Endpoint::parse(addr),
            None => Ok(Endpoint::Unix(resolve_socket(
                self.socket.clone(),
                self.label.as_deref(),
            )?)),
        }
    }

    pub fn mode(&self) -> Mode {
        let Some(name) = self.command.first() else {
            return Mode::Attach {
                target: None,
                create: true,
            };
        };
        let rest = &self.command[1..];
        match name.as_str() {
            "attach" | "attach-session" => Mode::Attach {
                target: flag_value(rest, 't', "t"),
                create: false,
            },
            "new" | "new-session" if !has_flag(rest, 'd', "cnsxy") => {
                Mode::Interactive(self.command.clone())
            }
            _ => Mode::Command(self.command.clone()),
        }
    }
}

/// Walk getopt-style flag clusters up to the first operand. `takes_value`
/// lists the flags that consume an argument.
fn scan_flags<'a>(args: &'a [String], takes_value: &str) -> Vec<(char, Option<&'a str>)> {
    let mut found = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }
        let Some(cluster) = arg.strip_prefix('-').filter(|c| !c.is_empty()) else {
            break;
        };
        for (i, flag) in cluster.char_indices() {
            if takes_value.contains(flag) {
                let inline = &cluster[i + flag.len_utf8()..];
                let value = if inline.is_empty() {
                    iter.next().map(String::as_str)
                } else {
                    Some(inline)
                };
                found.push((flag, value));
                break;
            }
            found.push((flag, None));
        }
    }
    found
}

fn has_flag(args: &[String], flag: char, takes_value: &str) -> bool {
    scan_flags(args, takes_value).iter().any(|(f, _)| *f == flag)
}

fn flag_value(args: &[String], flag: char, takes_value: &str) -> Option<String> {
    scan_flags(args, takes_value)
        .into_iter()
        .filter(|(f, _)| *f == flag)
        .filter_map(|(_, v)| v.map(str::to_string))
        .last()
}
