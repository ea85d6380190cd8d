//! hostprobe - one-shot CPU and memory utilization report.
//!
//! Runs the CPU and memory probes for the current OS once and prints the
//! result as text or JSON. Exits with status 1 when collection fails and 2
//! on invalid configuration.

use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use hostprobe::config::parse_timeout;
use hostprobe::fmt::format_decimal;
use hostprobe::platform::{self, OsFamily};
use hostprobe::probe::ProcessRunner;
use hostprobe::{CollectorConfig, MetricCollector, MetricResult};

/// Machine CPU and memory utilization probe.
#[derive(Parser, Debug)]
#[command(
    name = "hostprobe",
    about = "Report current CPU and memory utilization",
    version
)]
struct Args {
    /// CPU probe command or script, replacing the OS default.
    #[arg(long, env = "HOSTPROBE_CPU_PROBE")]
    cpu_probe: Option<String>,

    /// Memory probe command or script, replacing the OS default.
    #[arg(long, env = "HOSTPROBE_MEM_PROBE")]
    mem_probe: Option<String>,

    /// Per-probe timeout in seconds. Overrides HOSTPROBE_TIMEOUT_SECS.
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// Accept probe output even when the probe exits non-zero.
    #[arg(long)]
    no_exit_check: bool,

    /// OS name to dispatch on instead of the detected one.
    #[arg(long, value_name = "NAME")]
    os_name: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// JSON report. Values are decimal strings, as returned to procedure hosts.
#[derive(Debug, Serialize)]
struct Report {
    collected_at: DateTime<Utc>,
    os: OsFamily,
    cpu_percent: String,
    memory_used_mb: String,
    memory_available_mb: String,
}

impl Report {
    fn new(collected_at: DateTime<Utc>, os: OsFamily, result: &MetricResult) -> Self {
        Self {
            collected_at,
            os,
            cpu_percent: format_decimal(result.cpu_percent),
            memory_used_mb: format_decimal(result.memory.used_mb),
            memory_available_mb: format_decimal(result.memory.available_mb),
        }
    }

    fn to_text(&self) -> String {
        format!(
            "os:               {}\n\
             collected at:     {}\n\
             cpu used:         {} %\n\
             memory used:      {} MB\n\
             memory available: {} MB",
            self.os,
            self.collected_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.cpu_percent,
            self.memory_used_mb,
            self.memory_available_mb
        )
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let mut config = match CollectorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(timeout);
    }
    if args.no_exit_check {
        config = config.with_exit_check(false);
    }

    let os_name = args.os_name.as_deref().unwrap_or(platform::os_name());
    let os = platform::resolve_os_family_from(os_name);
    info!(os_name, %os, timeout = ?config.timeout, "starting collection");

    let collector = MetricCollector::new(ProcessRunner::new(), config);
    let result = match collector.collect_for(
        os_name,
        args.cpu_probe.as_deref(),
        args.mem_probe.as_deref(),
    ) {
        Ok(result) => result,
        Err(e) => {
            error!(kind = %e.kind(), "{}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = Report::new(Utc::now(), os, &result);
    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "failed to serialize report");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report.to_text());
    }

    ExitCode::SUCCESS
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("hostprobe={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hostprobe::MemoryUsage;

    fn sample_report() -> Report {
        let result = MetricResult {
            cpu_percent: 36.14,
            memory: MemoryUsage {
                used_mb: 4190.64,
                available_mb: 1808.0,
            },
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        Report::new(at, OsFamily::Windows, &result)
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "hostprobe",
            "--cpu-probe",
            "./cpu.sh",
            "--timeout",
            "1.5",
            "--no-exit-check",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.cpu_probe.as_deref(), Some("./cpu.sh"));
        assert_eq!(args.timeout, Some(Duration::from_millis(1500)));
        assert!(args.no_exit_check);
        assert!(args.json);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_args_reject_bad_timeout() {
        assert!(Args::try_parse_from(["hostprobe", "--timeout", "-1"]).is_err());
    }

    #[test]
    fn test_report_json() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["os"], "windows");
        assert_eq!(json["cpu_percent"], "36.14");
        assert_eq!(json["memory_available_mb"], "1808.0");
        assert_eq!(json["collected_at"], "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_report_text() {
        let text = sample_report().to_text();
        assert!(text.contains("cpu used:         36.14 %"));
        assert!(text.contains("memory used:      4190.64 MB"));
        assert!(text.contains("2024-03-01 12:30:00 UTC"));
    }
}
