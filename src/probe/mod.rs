//! External probe execution and output parsing.
//!
//! A probe is a command or script printing a raw system metric on stdout.
//! `runner` executes it, `parser` turns its lines into numbers.

pub mod command;
pub mod mock;
pub mod parser;
pub mod runner;

pub use command::{MetricKind, ProbeCommand};
pub use mock::{MockResponse, MockRunner};
pub use parser::ParseError;
pub use runner::{CommandRunner, ProbeOutput, ProcessRunner, RunError};
