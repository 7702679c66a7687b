//! Shared data types for the weft protocol

mod common;
mod grid;
mod session;

pub use common::*;
pub use grid::*;
pub use session::*;
