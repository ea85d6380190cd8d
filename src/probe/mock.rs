//! In-memory mock runner for testing collectors without spawning processes.
//!
//! `MockRunner` maps command lines to scripted responses and records every
//! invocation, so tests can assert both on parsed results and on which probes
//! were (or were not) executed.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use super::command::ProbeCommand;
use super::runner::{CommandRunner, ProbeOutput, RunError};
use crate::config::DefaultCommands;

/// Scripted behaviour for one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// The probe runs and prints these lines.
    Output(ProbeOutput),
    /// The program cannot be started.
    LaunchFailure,
    /// The wait is interrupted.
    Interrupted,
    /// The probe never finishes.
    Hang,
}

/// Command runner returning canned output.
///
/// Unknown commands fail to launch, as a missing executable would.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: HashMap<String, MockResponse>,
    invocations: Mutex<Vec<String>>,
}

impl MockRunner {
    /// Creates a runner with no registered commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command that prints `lines` and exits with code 0.
    pub fn add_output(&mut self, command: &str, lines: &[&str]) {
        self.add_output_with_code(command, lines, Some(0));
    }

    /// Registers a command that prints `lines` and exits with `exit_code`.
    pub fn add_output_with_code(&mut self, command: &str, lines: &[&str], exit_code: Option<i32>) {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.add_response(command, MockResponse::Output(ProbeOutput::new(lines, exit_code)));
    }

    /// Registers an arbitrary response.
    pub fn add_response(&mut self, command: &str, response: MockResponse) {
        self.responses.insert(normalize(command), response);
    }

    /// Returns the command lines run so far, in order.
    pub fn invocations(&self) -> Vec<String> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

fn normalize(command: &str) -> String {
    ProbeCommand::parse(command)
        .map(|c| c.to_string())
        .unwrap_or_default()
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &ProbeCommand, timeout: Duration) -> Result<ProbeOutput, RunError> {
        let key = command.to_string();
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(key.clone());
        }

        match self.responses.get(&key) {
            Some(MockResponse::Output(output)) => Ok(output.clone()),
            Some(MockResponse::LaunchFailure) | None => Err(RunError::Launch(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", command.program()),
            ))),
            Some(MockResponse::Interrupted) => Err(RunError::Interrupted(io::Error::new(
                io::ErrorKind::Interrupted,
                "wait interrupted",
            ))),
            Some(MockResponse::Hang) => Err(RunError::TimedOut(timeout)),
        }
    }
}

impl MockRunner {
    /// A Linux host answering the default probes: a since-boot line plus
    /// three samples at 95.6, 94.0 and 96.2 percent idle, and 120 MB used
    /// with 1808 MB available.
    pub fn typical_linux() -> Self {
        let commands = DefaultCommands::default();
        let mut runner = Self::new();
        runner.add_output(
            &commands.cpu_linux,
            &[
                "Cpu(s):  9.1%us,  2.3%sy,  0.0%ni, 87.9%id,  0.6%wa,  0.0%hi,  0.1%si,  0.0%st",
                "Cpu(s):  3.7%us,  0.4%sy,  0.0%ni, 95.6%id,  0.1%wa,  0.0%hi,  0.1%si,  0.0%st",
                "Cpu(s):  5.1%us,  0.9%sy,  0.0%ni, 94.0%id,  0.0%wa,  0.0%hi,  0.0%si,  0.0%st",
                "Cpu(s):  3.0%us,  0.8%sy,  0.0%ni, 96.2%id,  0.0%wa,  0.0%hi,  0.0%si,  0.0%st",
            ],
        );
        runner.add_output(
            &commands.memory_linux,
            &["-/+ buffers/cache:     120    1808"],
        );
        runner
    }

    /// A Windows host answering the default probes.
    pub fn typical_windows() -> Self {
        let commands = DefaultCommands::default();
        let mut runner = Self::new();
        runner.add_output(&commands.cpu_windows, &["Processor_Time=36.1352003502669"]);
        runner.add_output(
            &commands.memory_windows,
            &[
                "Memory_Total=5999.49",
                "Memory_In_Use=4190.64",
                "Memory_Available=1808.84",
            ],
        );
        runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(s: &str) -> ProbeCommand {
        ProbeCommand::parse(s).unwrap()
    }

    #[test]
    fn test_registered_output() {
        let mut runner = MockRunner::new();
        runner.add_output("./cpu.sh", &["a", "b"]);

        let output = runner.run(&cmd("./cpu.sh"), Duration::from_secs(1)).unwrap();
        assert_eq!(output.lines, vec!["a", "b"]);
        assert!(output.success());
        assert_eq!(runner.invocations(), vec!["./cpu.sh"]);
    }

    #[test]
    fn test_unknown_command_fails_to_launch() {
        let runner = MockRunner::new();
        let err = runner.run(&cmd("./missing.sh"), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RunError::Launch(_)));
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let mut runner = MockRunner::new();
        runner.add_output("powershell.exe   -file  x.ps1", &["ok"]);
        let output = runner
            .run(&cmd("powershell.exe -file x.ps1"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(output.lines, vec!["ok"]);
    }

    #[test]
    fn test_hang_times_out() {
        let mut runner = MockRunner::new();
        runner.add_response("./slow.sh", MockResponse::Hang);
        let err = runner.run(&cmd("./slow.sh"), Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, RunError::TimedOut(d) if d == Duration::from_millis(10)));
    }
}
