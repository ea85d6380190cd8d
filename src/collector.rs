//! OS-dispatching metric collector.
//!
//! `MetricCollector` resolves the probe command for the current OS family,
//! runs it through a [`CommandRunner`] and parses the captured output. One
//! strategy exists per (OS family, metric) pair:
//!
//! | OS      | CPU                               | Memory                           |
//! |---------|-----------------------------------|----------------------------------|
//! | Windows | `Processor_Time=` busy percentage | `Memory_In_Use=`/`Memory_Available=` |
//! | Linux   | mean busy over `top` samples      | last two tokens of a `free` line |
//!
//! # Usage
//!
//! ```
//! use hostprobe::collector::MetricCollector;
//! use hostprobe::config::CollectorConfig;
//! use hostprobe::probe::MockRunner;
//!
//! let collector = MetricCollector::new(MockRunner::typical_linux(), CollectorConfig::default());
//! let result = collector.collect_for("Linux", None, None).unwrap();
//! assert_eq!(result.cpu_percent, 4.73);
//! assert_eq!(result.memory.available_mb, 1808.0);
//! ```

use tracing::{Dispatch, debug, info, info_span, warn};

use crate::config::CollectorConfig;
use crate::error::{CollectError, ErrorKind};
use crate::fmt::round2;
use crate::model::{MemoryUsage, MetricResult};
use crate::platform::{self, OsFamily};
use crate::probe::parser::{self, ParseError};
use crate::probe::{CommandRunner, MetricKind, ProbeCommand, RunError};

/// Collects CPU and memory utilization through external probes.
pub struct MetricCollector<R: CommandRunner> {
    runner: R,
    config: CollectorConfig,
    dispatch: Option<Dispatch>,
}

impl<R: CommandRunner> MetricCollector<R> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `runner` - Probe runner implementation (real or mock)
    /// * `config` - Timeout, exit-code policy and default commands
    pub fn new(runner: R, config: CollectorConfig) -> Self {
        Self {
            runner,
            config,
            dispatch: None,
        }
    }

    /// Routes this collector's diagnostics to `dispatch` instead of the
    /// ambient default subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        self.scoped_in(None, f)
    }

    /// Runs `f` under `dispatch`, else under the collector's own dispatch.
    fn scoped_in<T>(&self, dispatch: Option<&Dispatch>, f: impl FnOnce() -> T) -> T {
        match dispatch.or(self.dispatch.as_ref()) {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Collects all three metrics for the running OS.
    pub fn collect(
        &self,
        cpu_probe: Option<&str>,
        mem_probe: Option<&str>,
    ) -> Result<MetricResult, CollectError> {
        self.collect_for(platform::os_name(), cpu_probe, mem_probe)
    }

    /// Collects all three metrics as if running on `os_name`.
    ///
    /// CPU is collected first; a CPU failure short-circuits the call and the
    /// memory probe is not run. Unsupported platforms fail without running
    /// any probe.
    pub fn collect_for(
        &self,
        os_name: &str,
        cpu_probe: Option<&str>,
        mem_probe: Option<&str>,
    ) -> Result<MetricResult, CollectError> {
        self.collect_for_in(None, os_name, cpu_probe, mem_probe)
    }

    /// Same as [`collect_for`](Self::collect_for), logging to `dispatch`
    /// when given instead of the collector's own dispatch.
    pub fn collect_for_in(
        &self,
        dispatch: Option<&Dispatch>,
        os_name: &str,
        cpu_probe: Option<&str>,
        mem_probe: Option<&str>,
    ) -> Result<MetricResult, CollectError> {
        self.scoped_in(dispatch, || -> Result<MetricResult, CollectError> {
            let os = platform::resolve_os_family_from(os_name);
            let _span = info_span!("collect", %os).entered();

            let (cpu_percent, memory) = match os {
                OsFamily::Windows => (
                    self.cpu_percent_windows(cpu_probe)?,
                    self.memory_mb_windows(mem_probe)?,
                ),
                OsFamily::Linux => (
                    self.cpu_percent_linux(cpu_probe)?,
                    self.memory_mb_linux(mem_probe)?,
                ),
                OsFamily::Unsupported => {
                    warn!(os_name, "platform is not supported");
                    return Err(CollectError::new(
                        ErrorKind::UnsupportedPlatform,
                        os,
                        format!("OS '{}' is not supported", os_name),
                    ));
                }
            };

            info!(
                cpu_percent,
                used_mb = memory.used_mb,
                available_mb = memory.available_mb,
                "collection finished"
            );
            Ok(MetricResult {
                cpu_percent,
                memory,
            })
        })
    }

    /// Percent CPU busy from the Windows probe, rounded to two decimals.
    pub fn get_cpu_percent_windows(&self, probe: Option<&str>) -> Result<f64, CollectError> {
        self.scoped(|| self.cpu_percent_windows(probe))
    }

    /// Used and available memory in MB from the Windows probe.
    pub fn get_memory_mb_windows(&self, probe: Option<&str>) -> Result<MemoryUsage, CollectError> {
        self.scoped(|| self.memory_mb_windows(probe))
    }

    /// Percent CPU busy averaged over the Linux probe's samples.
    pub fn get_cpu_percent_linux(&self, probe: Option<&str>) -> Result<f64, CollectError> {
        self.scoped(|| self.cpu_percent_linux(probe))
    }

    /// Used and available memory in MB from the Linux probe.
    pub fn get_memory_mb_linux(&self, probe: Option<&str>) -> Result<MemoryUsage, CollectError> {
        self.scoped(|| self.memory_mb_linux(probe))
    }

    fn cpu_percent_windows(&self, probe: Option<&str>) -> Result<f64, CollectError> {
        let os = OsFamily::Windows;
        let (command, lines) = self.run_probe(os, MetricKind::Cpu, probe)?;
        let busy = parser::parse_processor_time(&lines)
            .map_err(|e| parse_failure(e, os, &command))?;
        let cpu_percent = round2(busy);
        info!(cpu_percent, "windows cpu");
        Ok(cpu_percent)
    }

    fn memory_mb_windows(&self, probe: Option<&str>) -> Result<MemoryUsage, CollectError> {
        let os = OsFamily::Windows;
        let (command, lines) = self.run_probe(os, MetricKind::Memory, probe)?;
        let memory = parser::parse_windows_memory(&lines)
            .map_err(|e| parse_failure(e, os, &command))?;
        info!(used_mb = memory.used_mb, available_mb = memory.available_mb, "windows memory");
        Ok(memory)
    }

    fn cpu_percent_linux(&self, probe: Option<&str>) -> Result<f64, CollectError> {
        let os = OsFamily::Linux;
        let (command, lines) = self.run_probe(os, MetricKind::Cpu, probe)?;
        let samples = parser::parse_top_idle_samples(&lines)
            .map_err(|e| parse_failure(e, os, &command))?;
        debug!(?samples, "idle samples");
        let cpu_percent =
            parser::mean_busy_percent(&samples).map_err(|e| parse_failure(e, os, &command))?;
        info!(cpu_percent, samples = samples.len(), "linux cpu");
        Ok(cpu_percent)
    }

    fn memory_mb_linux(&self, probe: Option<&str>) -> Result<MemoryUsage, CollectError> {
        let os = OsFamily::Linux;
        let (command, lines) = self.run_probe(os, MetricKind::Memory, probe)?;
        let memory =
            parser::parse_linux_memory(&lines).map_err(|e| parse_failure(e, os, &command))?;
        info!(used_mb = memory.used_mb, available_mb = memory.available_mb, "linux memory");
        Ok(memory)
    }

    /// Resolves, runs and exit-checks one probe, returning its stdout lines.
    fn run_probe(
        &self,
        os: OsFamily,
        kind: MetricKind,
        probe: Option<&str>,
    ) -> Result<(ProbeCommand, Vec<String>), CollectError> {
        let default = self.config.commands.get(os, kind).unwrap_or_default();
        let command = ProbeCommand::resolve(probe, default).ok_or_else(|| {
            CollectError::new(
                ErrorKind::ProcessLaunchFailed,
                os,
                format!("no {} probe command configured", kind),
            )
        })?;
        info!(%kind, command = %command, "running probe");

        let output = self
            .runner
            .run(&command, self.config.timeout)
            .map_err(|e| run_failure(e, os, &command))?;

        if !output.success() {
            let code = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            if self.config.check_exit_status {
                return Err(CollectError::new(
                    ErrorKind::ProbeExitedNonZero,
                    os,
                    format!("{} probe exited with {}", kind, code),
                )
                .with_command(command.to_string()));
            }
            warn!(%kind, command = %command, exit = %code, "probe exited non-zero");
        }

        Ok((command, output.lines))
    }
}

fn parse_failure(e: ParseError, os: OsFamily, command: &ProbeCommand) -> CollectError {
    CollectError::new(e.kind, os, e.message).with_command(command.to_string())
}

fn run_failure(e: RunError, os: OsFamily, command: &ProbeCommand) -> CollectError {
    let kind = match &e {
        RunError::Launch(_) | RunError::Io(_) => ErrorKind::ProcessLaunchFailed,
        RunError::Interrupted(_) => ErrorKind::ProcessInterrupted,
        RunError::TimedOut(_) => ErrorKind::ProbeTimedOut,
    };
    CollectError::new(kind, os, e.to_string()).with_command(command.to_string())
}
