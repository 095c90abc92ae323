//! External downloader execution.
//!
//! - `command`: URL classification, tool selection and argument building
//! - `process`: spawning, merged output lines, SIGTERM/SIGKILL cancellation
//! - `parser`: per-family progress parsers

pub mod command;
pub mod parser;
pub mod process;

pub use command::{CommandSpec, ToolFamily, ToolSelector, UrlShape, classify};
pub use parser::{ProgressParser, parser_for};
pub use process::{ExitOutcome, ProcessAdapter, ProcessError, RunningProcess};
