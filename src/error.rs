//! Error type for metric collection failures.

use crate::platform::OsFamily;

/// Classification of a collection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The probe executable could not be started.
    ProcessLaunchFailed,
    /// Waiting on the probe process was interrupted.
    ProcessInterrupted,
    /// The probe ran but never printed the expected field.
    ProbeOutputMissingMetric,
    /// Memory used/available were not both reported exactly once.
    IncompleteMemorySample,
    /// No CPU sample lines remained after discarding the first.
    NoSamplesCollected,
    /// The probe printed nothing.
    NoOutputProduced,
    /// The running OS is neither Windows nor Linux.
    UnsupportedPlatform,
    /// The probe did not exit within the configured timeout.
    ProbeTimedOut,
    /// The probe exited with a non-zero status.
    ProbeExitedNonZero,
    /// A matched field held a value that is not a number.
    MalformedValue,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ProcessLaunchFailed => "process launch failed",
            ErrorKind::ProcessInterrupted => "process interrupted",
            ErrorKind::ProbeOutputMissingMetric => "probe output missing metric",
            ErrorKind::IncompleteMemorySample => "incomplete memory sample",
            ErrorKind::NoSamplesCollected => "no samples collected",
            ErrorKind::NoOutputProduced => "no output produced",
            ErrorKind::UnsupportedPlatform => "unsupported platform",
            ErrorKind::ProbeTimedOut => "probe timed out",
            ErrorKind::ProbeExitedNonZero => "probe exited non-zero",
            ErrorKind::MalformedValue => "malformed value",
        };
        f.write_str(s)
    }
}

/// A typed collection failure carrying enough context to diagnose it:
/// the OS family, the probe command (when one was resolved) and a detail
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectError {
    kind: ErrorKind,
    os: OsFamily,
    command: Option<String>,
    detail: String,
}

impl CollectError {
    pub fn new(kind: ErrorKind, os: OsFamily, detail: impl Into<String>) -> Self {
        Self {
            kind,
            os,
            command: None,
            detail: detail.into(),
        }
    }

    /// Attaches the probe command that produced this error.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (os={}", self.kind, self.detail, self.os)?;
        if let Some(command) = &self.command {
            write!(f, ", command={}", command)?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for CollectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_command() {
        let err = CollectError::new(
            ErrorKind::IncompleteMemorySample,
            OsFamily::Windows,
            "expected used and available, got 1 value",
        )
        .with_command("powershell.exe -file mem.ps1");

        assert_eq!(
            err.to_string(),
            "incomplete memory sample: expected used and available, got 1 value \
             (os=Windows, command=powershell.exe -file mem.ps1)"
        );
        assert_eq!(err.command(), Some("powershell.exe -file mem.ps1"));
    }

    #[test]
    fn test_display_without_command() {
        let err = CollectError::new(ErrorKind::UnsupportedPlatform, OsFamily::Unsupported, "macos");
        assert_eq!(
            err.to_string(),
            "unsupported platform: macos (os=Unsupported)"
        );
        assert!(err.command().is_none());
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }
}
