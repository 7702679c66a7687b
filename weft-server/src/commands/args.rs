//! getopt-style argument parsing for commands

use std::collections::HashMap;

use super::CommandError;

/// Flags and positional arguments of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    flags: HashMap<char, Option<String>>,
    values: Vec<String>,
}

impl Args {
    /// Parse `argv` (without the command name) against a flag template.
    ///
    /// The template lists accepted flag letters; a letter followed by `:`
    /// takes a value. Flags may be grouped (`-dP`), values may be attached
    /// (`-tmain`) or separate (`-t main`), and `--` ends flag parsing.
    pub fn parse(command: &str, argv: &[String], template: &str) -> Result<Self, CommandError> {
        let mut args = Args::default();
        let mut iter = argv.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                args.values.extend(iter.by_ref().cloned());
                break;
            }
            let Some(letters) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) else {
                args.values.push(arg.clone());
                args.values.extend(iter.by_ref().cloned());
                break;
            };

            let mut chars = letters.char_indices();
            while let Some((pos, flag)) = chars.next() {
                match takes_value(template, flag) {
                    None => {
                        return Err(CommandError::InvalidArgument(format!(
                            "{}: unknown flag -{}",
                            command, flag
                        )))
                    }
                    Some(false) => {
                        args.flags.insert(flag, None);
                    }
                    Some(true) => {
                        let attached = &letters[pos + flag.len_utf8()..];
                        let value = if !attached.is_empty() {
                            attached.to_string()
                        } else {
                            iter.next().cloned().ok_or_else(|| {
                                CommandError::InvalidArgument(format!(
                                    "{}: -{} expects an argument",
                                    command, flag
                                ))
                            })?
                        };
                        args.flags.insert(flag, Some(value));
                        break;
                    }
                }
            }
        }
        Ok(args)
    }

    pub fn has(&self, flag: char) -> bool {
        self.flags.contains_key(&flag)
    }

    pub fn value(&self, flag: char) -> Option<&str> {
        self.flags.get(&flag).and_then(|v| v.as_deref())
    }

    pub fn owned(&self, flag: char) -> Option<String> {
        self.value(flag).map(str::to_string)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    /// Numeric flag value
    pub fn number<T: std::str::FromStr>(&self, flag: char) -> Result<Option<T>, CommandError> {
        match self.value(flag) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                CommandError::InvalidArgument(format!("-{}: not a number: {}", flag, raw))
            }),
        }
    }
}

fn takes_value(template: &str, flag: char) -> Option<bool> {
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        let has_value = chars.peek() == Some(&':');
        if has_value {
            chars.next();
        }
        if c == flag {
            return Some(has_value);
        }
    }
    None
}

/// Split a command line into words. Single quotes are literal, double
/// quotes allow `\` escapes, and `;` is only special as a separate word.
pub fn split_command_line(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated(line)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => current.push(c),
                            None => return Err(unterminated(line)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated(line)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    current.push(c);
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn unterminated(line: &str) -> CommandError {
    CommandError::InvalidArgument(format!("unterminated quote: {}", line))
}
