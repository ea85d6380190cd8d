//! hostprobe - CPU and memory utilization via external probe scripts.
//!
//! The library picks a probing strategy for the running OS, runs the probe
//! commands and parses their textual output:
//! - `collector` - OS dispatch and the four collection strategies
//! - `probe` - command execution (`CommandRunner`) and output parsers
//! - `procedure` - string-in/string-out adapter for a host procedure runtime

pub mod collector;
pub mod config;
pub mod error;
pub mod fmt;
pub mod model;
pub mod platform;
pub mod probe;
pub mod procedure;

pub use collector::MetricCollector;
pub use config::{CollectorConfig, ConfigError};
pub use error::{CollectError, ErrorKind};
pub use model::{MemoryUsage, MetricResult};
pub use platform::OsFamily;
pub use procedure::{CpuMemProcedure, collect};
