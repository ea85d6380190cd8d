//! Metric values produced by a single collection call.

use serde::Serialize;

/// Physical memory figures in megabytes.
///
/// Both values are always present together; a probe reporting only one of
/// them is a failed sample, never a partial result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub used_mb: f64,
    pub available_mb: f64,
}

/// Complete result of one collection call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricResult {
    /// Percent of CPU in use, rounded to two decimals.
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
}
