//! Abstraction for running probe commands, to enable testing and mocking.
//!
//! The `CommandRunner` trait lets the collector spawn real subprocesses in
//! production and use scripted output (see [`MockRunner`]) in tests.
//!
//! [`MockRunner`]: crate::probe::mock::MockRunner

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::command::ProbeCommand;

/// Interval between exit-status polls while waiting on a probe.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Captured result of a finished probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    /// Standard output, one entry per line, without line terminators.
    pub lines: Vec<String>,
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProbeOutput {
    pub fn new(lines: Vec<String>, exit_code: Option<i32>) -> Self {
        Self { lines, exit_code }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Error type for probe execution failures.
#[derive(Debug)]
pub enum RunError {
    /// The program could not be started.
    Launch(io::Error),
    /// Spawning or waiting was interrupted.
    Interrupted(io::Error),
    /// The probe was still running when the timeout expired.
    TimedOut(Duration),
    /// Reading output or polling the process failed.
    Io(io::Error),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Launch(e) => write!(f, "failed to launch: {}", e),
            RunError::Interrupted(e) => write!(f, "interrupted: {}", e),
            RunError::TimedOut(d) => write!(f, "still running after {:?}", d),
            RunError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

/// Abstraction for executing a probe and capturing its output.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion, draining its standard output, and
    /// returns the captured lines and exit code.
    ///
    /// Must give up with [`RunError::TimedOut`] once `timeout` has elapsed.
    fn run(&self, command: &ProbeCommand, timeout: Duration) -> Result<ProbeOutput, RunError>;
}

/// Real runner that spawns the probe as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ProbeCommand, timeout: Duration) -> Result<ProbeOutput, RunError> {
        // `None` means the timeout is too large to represent; wait unbounded.
        let deadline = Instant::now().checked_add(timeout);

        debug!(command = %command, ?timeout, "spawning probe");
        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::Interrupted => RunError::Interrupted(e),
                _ => RunError::Launch(e),
            })?;

        let Some(stdout) = child.stdout.take() else {
            kill(&mut child);
            return Err(RunError::Io(io::Error::other("probe stdout was not captured")));
        };

        // Drain stdout on its own thread so a probe writing more than the
        // pipe buffer holds cannot block before it exits.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(read_lines(stdout));
        });

        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let lines = match received {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => {
                kill(&mut child);
                return Err(RunError::Io(e));
            }
            Err(RecvTimeoutError::Timeout) => {
                kill(&mut child);
                return Err(RunError::TimedOut(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                kill(&mut child);
                return Err(RunError::Io(io::Error::other("probe output reader exited")));
            }
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(command = %command, lines = lines.len(), ?status, "probe finished");
                    return Ok(ProbeOutput::new(lines, status.code()));
                }
                Ok(None) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        kill(&mut child);
                        return Err(RunError::TimedOut(timeout));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    kill(&mut child);
                    return Err(RunError::Interrupted(e));
                }
                Err(e) => {
                    kill(&mut child);
                    return Err(RunError::Io(e));
                }
            }
        }
    }
}

/// Reads all lines, replacing invalid UTF-8 and stripping `\n` / `\r\n`.
fn read_lines<R: Read>(source: R) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(source);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(lines);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill probe");
    }
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines_strips_terminators() {
        let input = b"first\r\nsecond\n\nlast-without-newline".as_slice();
        let lines = read_lines(input).unwrap();
        assert_eq!(lines, vec!["first", "second", "", "last-without-newline"]);
    }

    #[test]
    fn test_read_lines_lossy_utf8() {
        let input = b"Processor_Time=1\xff\n".as_slice();
        let lines = read_lines(input).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Processor_Time=1"));
    }

    #[test]
    fn test_read_lines_empty() {
        assert!(read_lines(b"".as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_probe_output_success() {
        assert!(ProbeOutput::new(vec![], Some(0)).success());
        assert!(!ProbeOutput::new(vec![], Some(1)).success());
        assert!(!ProbeOutput::new(vec![], None).success());
    }

    #[test]
    fn test_launch_failure() {
        let cmd = ProbeCommand::parse("/nonexistent/probe-12345").unwrap();
        let err = ProcessRunner::new()
            .run(&cmd, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, RunError::Launch(_)));
    }

    #[test]
    fn test_unrepresentable_timeout_does_not_panic() {
        let cmd = ProbeCommand::parse("/nonexistent/probe-12345").unwrap();
        let err = ProcessRunner::new().run(&cmd, Duration::MAX).unwrap_err();
        assert!(matches!(err, RunError::Launch(_)));
    }
}
