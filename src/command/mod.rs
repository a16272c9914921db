//! Spoken control commands.
//!
//! [`CommandInterpreter`] classifies a transcript as one of the fixed
//! control commands or as a plain query.  It is pure; every side effect of a
//! command lives in the controller.

pub mod interpreter;

pub use interpreter::{Command, CommandInterpreter};
