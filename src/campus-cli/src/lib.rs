//! Campus CLI library.
//!
//! - `cli/` - argument parsing and command dispatch
//! - `styled_output` - colored status lines on stderr

pub mod cli;
pub mod styled_output;
