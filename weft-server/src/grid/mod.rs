//! Terminal emulation for panes
//!
//! Bytes read from a pane's pty go through [`parser::Parser`], whose actions
//! are applied to a [`Grid`]. Observers are kept up to date with
//! [`DamageTracker`] deltas.

mod damage;
pub mod parser;
mod screen;

pub use damage::DamageTracker;
pub use parser::{Action, CsiSequence, Parser, ParserState};
pub use screen::{Grid, Modes, Pen, Row, DEFAULT_HISTORY_LIMIT};
