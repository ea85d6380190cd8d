//! Host procedure adapter.
//!
//! Presents the collector with the host's calling convention: three optional
//! string inputs (`debug`, CPU probe, memory probe) and three string outputs.
//! Lifecycle hooks of the host (commit, rollback, compensation) have no
//! behaviour here and are not modelled.

use tracing::{Dispatch, Level, info, warn};

use crate::collector::MetricCollector;
use crate::config::{CollectorConfig, ConfigError};
use crate::error::CollectError;
use crate::fmt::format_decimal;
use crate::model::MetricResult;
use crate::probe::{CommandRunner, ProcessRunner};

/// Procedure name exposed to the host.
pub const NAME: &str = "CpuAndMemChecker";
/// Procedure description exposed to the host.
pub const DESCRIPTION: &str = "Gets current machine CPU and memory utilization.";

/// Direction of a procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Descriptor of one string-typed procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub direction: Direction,
}

const PARAMETERS: [ParameterInfo; 6] = [
    ParameterInfo {
        name: "debug",
        direction: Direction::In,
    },
    ParameterInfo {
        name: "cpuScriptNameOrCommand",
        direction: Direction::In,
    },
    ParameterInfo {
        name: "memScriptNameOrCommand",
        direction: Direction::In,
    },
    ParameterInfo {
        name: "cpuUsedPercent",
        direction: Direction::Out,
    },
    ParameterInfo {
        name: "memoryUsedMb",
        direction: Direction::Out,
    },
    ParameterInfo {
        name: "memoryAvailMb",
        direction: Direction::Out,
    },
];

/// Output values as decimal strings: CPU percent, used MB, available MB.
pub type OutputValues = (String, String, String);

/// Renders a result in the host's string convention.
pub fn to_output_values(result: &MetricResult) -> OutputValues {
    (
        format_decimal(result.cpu_percent),
        format_decimal(result.memory.used_mb),
        format_decimal(result.memory.available_mb),
    )
}

/// Parses the host's debug flag: `Y` (any case) enables it, anything else
/// or a missing value disables it.
pub fn parse_debug_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("y"))
}

fn debug_dispatch() -> Dispatch {
    Dispatch::new(
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish(),
    )
}

/// The collector wrapped in the host's invoke/output protocol.
pub struct CpuMemProcedure<R: CommandRunner> {
    collector: MetricCollector<R>,
    dispatch: Option<Dispatch>,
    debug: bool,
    cpu_probe: Option<String>,
    mem_probe: Option<String>,
    os_name: Option<String>,
}

impl CpuMemProcedure<ProcessRunner> {
    /// Creates a procedure that runs real probe processes.
    pub fn new(config: CollectorConfig) -> Self {
        Self::with_collector(MetricCollector::new(ProcessRunner::new(), config))
    }
}

impl<R: CommandRunner> CpuMemProcedure<R> {
    pub fn with_collector(collector: MetricCollector<R>) -> Self {
        Self {
            collector,
            dispatch: None,
            debug: false,
            cpu_probe: None,
            mem_probe: None,
            os_name: None,
        }
    }

    /// Sets the log sink used when debug output is off.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Pretends to run on `os_name` instead of the detected OS.
    pub fn with_os_name(mut self, os_name: impl Into<String>) -> Self {
        self.os_name = Some(os_name.into());
        self
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTION
    }

    pub fn parameters(&self) -> &'static [ParameterInfo] {
        &PARAMETERS
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Captures the three input parameters in declaration order. Missing
    /// trailing inputs count as absent.
    pub fn invoke(&mut self, inputs: &[Option<String>]) {
        let input = |i: usize| inputs.get(i).cloned().flatten();
        self.debug = parse_debug_flag(input(0).as_deref());
        self.cpu_probe = input(1);
        self.mem_probe = input(2);
    }

    /// Sets the inputs directly.
    pub fn set_inputs(&mut self, debug: bool, cpu_probe: Option<&str>, mem_probe: Option<&str>) {
        self.debug = debug;
        self.cpu_probe = cpu_probe.map(str::to_string);
        self.mem_probe = mem_probe.map(str::to_string);
    }

    /// Runs the collection for the captured inputs.
    ///
    /// Debug output takes precedence over this procedure's dispatch, which in
    /// turn takes precedence over the collector's own.
    pub fn output_values(&self) -> Result<OutputValues, CollectError> {
        let verbose = self.debug.then(debug_dispatch);
        let dispatch = verbose.as_ref().or(self.dispatch.as_ref());

        let run = || -> Result<OutputValues, CollectError> {
            info!(
                debug = self.debug,
                cpu_probe = ?self.cpu_probe,
                mem_probe = ?self.mem_probe,
                "{} invoked",
                NAME
            );
            let os_name = self.os_name.as_deref().unwrap_or(crate::platform::os_name());
            let result = self.collector.collect_for_in(
                dispatch,
                os_name,
                self.cpu_probe.as_deref(),
                self.mem_probe.as_deref(),
            )?;
            Ok(to_output_values(&result))
        };

        match dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, run),
            None => run(),
        }
    }
}

/// Collects CPU percent, used MB and available MB as decimal strings,
/// running real probes on the detected OS.
///
/// Settings come from the `HOSTPROBE_*` environment variables; invalid ones
/// are logged and replaced by defaults. `debug` turns on verbose per-call
/// diagnostics on stderr. Failures are returned as their display message.
pub fn collect(
    debug: bool,
    cpu_probe: Option<&str>,
    mem_probe: Option<&str>,
) -> Result<OutputValues, String> {
    collect_with(
        CpuMemProcedure::new(config_or_default(CollectorConfig::from_env())),
        debug,
        cpu_probe,
        mem_probe,
    )
}

fn config_or_default(config: Result<CollectorConfig, ConfigError>) -> CollectorConfig {
    config.unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        CollectorConfig::default()
    })
}

/// Same as [`collect`] with a caller-built procedure.
pub fn collect_with<R: CommandRunner>(
    mut procedure: CpuMemProcedure<R>,
    debug: bool,
    cpu_probe: Option<&str>,
    mem_probe: Option<&str>,
) -> Result<OutputValues, String> {
    procedure.set_inputs(debug, cpu_probe, mem_probe);
    procedure.output_values().map_err(|e| e.to_string())
}
