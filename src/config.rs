//! Collector configuration.
//!
//! Defaults can be overridden from the environment:
//! - `HOSTPROBE_TIMEOUT_SECS`: per-probe timeout in seconds (default: 30)
//! - `HOSTPROBE_CHECK_EXIT`: fail on non-zero probe exit (default: true)
//! - `HOSTPROBE_CPU_COMMAND_LINUX`, `HOSTPROBE_MEMORY_COMMAND_LINUX`
//! - `HOSTPROBE_CPU_COMMAND_WINDOWS`, `HOSTPROBE_MEMORY_COMMAND_WINDOWS`

use std::time::Duration;

use crate::platform::OsFamily;
use crate::probe::command::MetricKind;

/// Default Windows CPU probe. Prints `Processor_Time=<busy percent>`.
pub const DEFAULT_CPU_COMMAND_WINDOWS: &str =
    "powershell.exe -ExecutionPolicy Bypass -File .\\scripts\\probe-cpu-windows.ps1";
/// Default Windows memory probe. Prints `Memory_Total=`, `Memory_In_Use=`
/// and `Memory_Available=` lines in MB.
pub const DEFAULT_MEMORY_COMMAND_WINDOWS: &str =
    "powershell.exe -ExecutionPolicy Bypass -File .\\scripts\\probe-mem-windows.ps1";
/// Default Linux CPU probe. Samples `top` four times, keeping `Cpu` lines.
pub const DEFAULT_CPU_COMMAND_LINUX: &str = "./scripts/probe-cpu-linux.sh";
/// Default Linux memory probe. Prints a buffers/cache-adjusted `free -m` line.
pub const DEFAULT_MEMORY_COMMAND_LINUX: &str = "./scripts/probe-mem-linux.sh";

/// Default per-probe timeout. `top -b -n 4` alone needs about nine seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_TIMEOUT_SECS: &str = "HOSTPROBE_TIMEOUT_SECS";
const ENV_CHECK_EXIT: &str = "HOSTPROBE_CHECK_EXIT";
const ENV_CPU_COMMAND_LINUX: &str = "HOSTPROBE_CPU_COMMAND_LINUX";
const ENV_MEMORY_COMMAND_LINUX: &str = "HOSTPROBE_MEMORY_COMMAND_LINUX";
const ENV_CPU_COMMAND_WINDOWS: &str = "HOSTPROBE_CPU_COMMAND_WINDOWS";
const ENV_MEMORY_COMMAND_WINDOWS: &str = "HOSTPROBE_MEMORY_COMMAND_WINDOWS";

/// Error type for invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: String,
    pub value: String,
    pub reason: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.var, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Command lines used when the caller does not supply a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultCommands {
    pub cpu_windows: String,
    pub memory_windows: String,
    pub cpu_linux: String,
    pub memory_linux: String,
}

impl Default for DefaultCommands {
    fn default() -> Self {
        Self {
            cpu_windows: DEFAULT_CPU_COMMAND_WINDOWS.to_string(),
            memory_windows: DEFAULT_MEMORY_COMMAND_WINDOWS.to_string(),
            cpu_linux: DEFAULT_CPU_COMMAND_LINUX.to_string(),
            memory_linux: DEFAULT_MEMORY_COMMAND_LINUX.to_string(),
        }
    }
}

impl DefaultCommands {
    /// Returns the default command for an OS family and metric, or `None`
    /// for unsupported platforms.
    pub fn get(&self, os: OsFamily, kind: MetricKind) -> Option<&str> {
        match (os, kind) {
            (OsFamily::Windows, MetricKind::Cpu) => Some(self.cpu_windows.as_str()),
            (OsFamily::Windows, MetricKind::Memory) => Some(self.memory_windows.as_str()),
            (OsFamily::Linux, MetricKind::Cpu) => Some(self.cpu_linux.as_str()),
            (OsFamily::Linux, MetricKind::Memory) => Some(self.memory_linux.as_str()),
            (OsFamily::Unsupported, _) => None,
        }
    }
}

/// Settings shared by every collection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Upper bound on a single probe's run time.
    pub timeout: Duration,
    /// Treat a non-zero probe exit code as a failure.
    pub check_exit_status: bool,
    pub commands: DefaultCommands,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            check_exit_status: true,
            commands: DefaultCommands::default(),
        }
    }
}

impl CollectorConfig {
    /// Creates a configuration from `HOSTPROBE_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = parse_timeout(&raw).map_err(|reason| ConfigError {
                var: ENV_TIMEOUT_SECS.to_string(),
                value: raw.clone(),
                reason,
            })?;
        }

        if let Some(raw) = lookup(ENV_CHECK_EXIT) {
            config.check_exit_status = parse_bool(&raw).ok_or_else(|| ConfigError {
                var: ENV_CHECK_EXIT.to_string(),
                value: raw.clone(),
                reason: "expected true/false, yes/no or 1/0".to_string(),
            })?;
        }

        let overrides = [
            (ENV_CPU_COMMAND_LINUX, &mut config.commands.cpu_linux),
            (ENV_MEMORY_COMMAND_LINUX, &mut config.commands.memory_linux),
            (ENV_CPU_COMMAND_WINDOWS, &mut config.commands.cpu_windows),
            (ENV_MEMORY_COMMAND_WINDOWS, &mut config.commands.memory_windows),
        ];
        for (var, slot) in overrides {
            if let Some(raw) = lookup(var) {
                if raw.trim().is_empty() {
                    return Err(ConfigError {
                        var: var.to_string(),
                        value: raw,
                        reason: "command must not be empty".to_string(),
                    });
                }
                *slot = raw;
            }
        }

        Ok(config)
    }

    /// Sets the per-probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables the non-zero exit check.
    pub fn with_exit_check(mut self, enabled: bool) -> Self {
        self.check_exit_status = enabled;
        self
    }
}

/// Parses a timeout in seconds; fractional values are allowed.
pub fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid number '{}': {}", s.trim(), e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be positive, got {}", secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("timeout {} out of range: {}", secs, e))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
