//! Probe command resolution.

/// Which metric a probe reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpu,
    Memory,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
        }
    }
}

/// A probe command line split into program and arguments.
///
/// Command strings are tokenized on whitespace, so
/// `powershell.exe -file .\probe-cpu-windows.ps1` runs `powershell.exe` with
/// two arguments. Quoting is not interpreted; wrap anything more elaborate
/// in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    program: String,
    args: Vec<String>,
}

impl ProbeCommand {
    /// Tokenizes a command line. Returns `None` for blank input.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut tokens = command_line.split_whitespace().map(str::to_string);
        let program = tokens.next()?;
        Some(Self {
            program,
            args: tokens.collect(),
        })
    }

    /// Picks the caller-supplied probe when it is non-blank, otherwise the
    /// default command line.
    pub fn resolve(probe: Option<&str>, default: &str) -> Option<Self> {
        probe.and_then(Self::parse).or_else(|| Self::parse(default))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl std::fmt::Display for ProbeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
