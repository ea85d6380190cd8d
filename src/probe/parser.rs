//! Parsers for probe output.
//!
//! Pure functions over the captured stdout lines of each probe. Every format
//! rule lives behind its own function so a change in a probe's output touches
//! one place. All of them are easily testable with string fixtures.

use tracing::{debug, trace};

use crate::error::ErrorKind;
use crate::fmt::round2;
use crate::model::MemoryUsage;

/// Key printed by the Windows CPU probe. Its value is already a busy
/// percentage.
pub const PROCESSOR_TIME_KEY: &str = "processor_time";
/// Key printed by the Windows memory probe for used memory in MB.
pub const MEMORY_IN_USE_KEY: &str = "memory_in_use";
/// Key printed by the Windows memory probe for available memory in MB.
pub const MEMORY_AVAILABLE_KEY: &str = "memory_available";

/// Marker preceding the idle field in a `top` CPU summary line.
const NICE_MARKER: &str = "ni,";
/// Marker following the idle field in a `top` CPU summary line.
const IDLE_MARKER: &str = "id,";

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a finite number. `NaN` and infinities are rejected.
fn parse_number(raw: &str, what: &str) -> Result<f64, ParseError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::new(
            ErrorKind::MalformedValue,
            format!("invalid {}: {:?}", what, raw),
        )),
    }
}

/// Splits a `name=value` line at the first `=`, trimming both halves.
///
/// Returns `None` for lines without `=`.
pub fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Parses the Windows CPU probe output.
///
/// Format: `Processor_Time=36.1352003502669`. The key is matched
/// case-insensitively and the last occurrence wins. The returned value is the
/// raw busy percentage, not yet rounded.
pub fn parse_processor_time<I, S>(lines: I) -> Result<f64, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut busy = None;

    for line in lines {
        let line = line.as_ref();
        debug!(line, "cpu probe line");
        let Some((key, value)) = parse_key_value(line) else {
            continue;
        };
        if key.eq_ignore_ascii_case(PROCESSOR_TIME_KEY) {
            busy = Some(parse_number(value, "Processor_Time")?);
        }
    }

    busy.ok_or_else(|| {
        ParseError::new(
            ErrorKind::ProbeOutputMissingMetric,
            "no Processor_Time line in probe output",
        )
    })
}

/// Parses the Windows memory probe output.
///
/// Format, one field per line:
/// ```text
/// Memory_Total=5999.48828125
/// Memory_In_Use=4190.64453125
/// Memory_Available=1808.84375
/// ```
/// `Memory_Total` and any other key are ignored. Used and available must each
/// appear exactly once.
pub fn parse_windows_memory<I, S>(lines: I) -> Result<MemoryUsage, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut used = None;
    let mut available = None;
    let mut matched = 0usize;

    for line in lines {
        let line = line.as_ref();
        debug!(line, "memory probe line");
        let Some((key, value)) = parse_key_value(line) else {
            continue;
        };
        if key.eq_ignore_ascii_case(MEMORY_IN_USE_KEY) {
            used = Some(parse_number(value, "Memory_In_Use")?);
            matched += 1;
        } else if key.eq_ignore_ascii_case(MEMORY_AVAILABLE_KEY) {
            available = Some(parse_number(value, "Memory_Available")?);
            matched += 1;
        } else {
            trace!(key, "ignoring memory probe key");
        }
    }

    match (used, available) {
        (Some(used_mb), Some(available_mb)) if matched == 2 => Ok(MemoryUsage {
            used_mb,
            available_mb,
        }),
        _ => Err(ParseError::new(
            ErrorKind::IncompleteMemorySample,
            format!(
                "expected Memory_In_Use and Memory_Available once each, got {} value(s)",
                matched
            ),
        )),
    }
}

/// Extracts the idle percentage from one `top` CPU summary line.
///
/// The idle field is whatever lies between `ni,` and the next `id,`, with
/// whitespace and `%` removed. Both of these layouts are accepted:
/// ```text
/// Cpu(s):  3.7%us,  0.4%sy,  0.0%ni, 95.6%id,  0.1%wa,  0.0%hi,  0.1%si,  0.0%st
/// %Cpu(s):  3.7 us,  0.4 sy,  0.0 ni, 95.6 id,  0.1 wa,  0.0 hi,  0.1 si,  0.0 st
/// ```
pub fn extract_idle_percent(line: &str) -> Result<f64, ParseError> {
    let start = line
        .find(NICE_MARKER)
        .map(|pos| pos + NICE_MARKER.len())
        .ok_or_else(|| {
            ParseError::new(
                ErrorKind::MalformedValue,
                format!("missing '{}' in cpu line: {:?}", NICE_MARKER, line),
            )
        })?;
    let end = line[start..]
        .find(IDLE_MARKER)
        .map(|pos| start + pos)
        .ok_or_else(|| {
            ParseError::new(
                ErrorKind::MalformedValue,
                format!("missing '{}' in cpu line: {:?}", IDLE_MARKER, line),
            )
        })?;

    let idle = line[start..end].trim().replace('%', "");
    trace!(idle = %idle, "idle field");
    parse_number(&idle, "idle percentage")
}

/// Parses the multi-sample Linux CPU probe output into idle percentages.
///
/// The first line is the average since boot and is discarded. Blank lines are
/// skipped; every other line must carry an idle field.
pub fn parse_top_idle_samples<I, S>(lines: I) -> Result<Vec<f64>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines = lines.into_iter();

    let Some(first) = lines.next() else {
        return Err(ParseError::new(
            ErrorKind::NoSamplesCollected,
            "cpu probe produced no output",
        ));
    };
    debug!(line = first.as_ref(), "discarding since-boot cpu line");

    let mut samples = Vec::new();
    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        debug!(line, "cpu sample line");
        samples.push(extract_idle_percent(line)?);
    }

    if samples.is_empty() {
        return Err(ParseError::new(
            ErrorKind::NoSamplesCollected,
            "no cpu samples after the since-boot line",
        ));
    }
    Ok(samples)
}

/// Averages busy time (`100 - idle`) over all samples, rounded to two
/// decimals.
pub fn mean_busy_percent(idle_samples: &[f64]) -> Result<f64, ParseError> {
    if idle_samples.is_empty() {
        return Err(ParseError::new(
            ErrorKind::NoSamplesCollected,
            "no idle samples to average",
        ));
    }
    let total: f64 = idle_samples.iter().map(|idle| 100.0 - idle).sum();
    Ok(round2(total / idle_samples.len() as f64))
}

/// Parses one `free`-style memory line.
///
/// The second-to-last whitespace token is used MB and the last token is
/// available MB, as in `-/+ buffers/cache:       120       1808`.
pub fn parse_free_memory_line(line: &str) -> Result<MemoryUsage, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [.., used, available] = tokens.as_slice() else {
        return Err(ParseError::new(
            ErrorKind::IncompleteMemorySample,
            format!(
                "expected at least 2 tokens in memory line, got {}: {:?}",
                tokens.len(),
                line
            ),
        ));
    };

    Ok(MemoryUsage {
        used_mb: parse_number(used, "used memory")?,
        available_mb: parse_number(available, "available memory")?,
    })
}

/// Parses the Linux memory probe output: only the first non-empty line is
/// read.
pub fn parse_linux_memory<I, S>(lines: I) -> Result<MemoryUsage, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        debug!(line, "memory probe line");
        return parse_free_memory_line(line);
    }
    Err(ParseError::new(
        ErrorKind::NoOutputProduced,
        "memory probe produced no output",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("Processor_Time=36.13"),
            Some(("Processor_Time", "36.13"))
        );
        assert_eq!(parse_key_value(" Memory_Total = 5999.49 "), Some(("Memory_Total", "5999.49")));
        assert_eq!(parse_key_value("no separator"), None);
    }

    #[test]
    fn test_parse_processor_time() {
        let busy = parse_processor_time(["Processor_Time=36.1352003502669"]).unwrap();
        assert_eq!(round2(busy), 36.14);
    }

    #[test]
    fn test_parse_processor_time_case_insensitive_last_wins() {
        let lines = ["", "PROCESSOR_TIME=10", "noise", "processor_time=12.5"];
        assert_eq!(parse_processor_time(lines).unwrap(), 12.5);
    }

    #[test]
    fn test_parse_processor_time_missing() {
        let err = parse_processor_time(["Memory_Total=1", "something else"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProbeOutputMissingMetric);

        let empty: [&str; 0] = [];
        let err = parse_processor_time(empty).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProbeOutputMissingMetric);
    }

    #[test]
    fn test_parse_processor_time_malformed() {
        let err = parse_processor_time(["Processor_Time=busy"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_parse_processor_time_non_finite() {
        for value in ["NaN", "inf", "-infinity"] {
            let line = format!("Processor_Time={}", value);
            let err = parse_processor_time([line]).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedValue, "value {}", value);
        }
    }

    #[test]
    fn test_parse_windows_memory_non_finite() {
        let err = parse_windows_memory(["Memory_In_Use=NaN", "Memory_Available=1808.84"])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_parse_windows_memory() {
        let lines = [
            "Memory_Total=5999.49",
            "Memory_In_Use=4190.64",
            "Memory_Available=1808.84",
        ];
        let mem = parse_windows_memory(lines).unwrap();
        assert_eq!(mem.used_mb, 4190.64);
        assert_eq!(mem.available_mb, 1808.84);
    }

    #[test]
    fn test_parse_windows_memory_any_order() {
        let lines = ["memory_available=1376.5", "MEMORY_IN_USE=4622.9"];
        let mem = parse_windows_memory(lines).unwrap();
        assert_eq!(mem.used_mb, 4622.9);
        assert_eq!(mem.available_mb, 1376.5);
    }

    #[test]
    fn test_parse_windows_memory_incomplete() {
        let err = parse_windows_memory(["Memory_Total=5999.49", "Memory_In_Use=4190.64"])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteMemorySample);
    }

    #[test]
    fn test_parse_windows_memory_duplicate_key() {
        let lines = [
            "Memory_In_Use=1",
            "Memory_In_Use=2",
            "Memory_Available=3",
        ];
        let err = parse_windows_memory(lines).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteMemorySample);
    }

    #[test]
    fn test_extract_idle_percent_percent_layout() {
        let line =
            "Cpu(s):  3.7%us,  0.4%sy,  0.0%ni, 95.6%id,  0.1%wa,  0.0%hi,  0.1%si,  0.0%st";
        assert_eq!(extract_idle_percent(line).unwrap(), 95.6);
    }

    #[test]
    fn test_extract_idle_percent_space_layout() {
        let line = "%Cpu(s):  3.7 us,  0.4 sy,  0.0 ni, 95.6 id,  0.1 wa,  0.0 hi,  0.1 si,  0.0 st";
        assert_eq!(extract_idle_percent(line).unwrap(), 95.6);
    }

    #[test]
    fn test_extract_idle_percent_missing_markers() {
        let err = extract_idle_percent("CPU usage: 4.54% user, 15.90% sys, 79.54% idle").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);

        let err = extract_idle_percent("Cpu(s): 0.0%ni, 95.6%idle").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_parse_top_idle_samples_discards_first() {
        let lines = [
            "Cpu(s):  9.0%us,  1.0%sy,  0.0%ni, 50.0%id,  0.1%wa,  0.0%hi,  0.1%si,  0.0%st",
            "Cpu(s):  3.7%us,  0.4%sy,  0.0%ni, 95.6%id,  0.1%wa,  0.0%hi,  0.1%si,  0.0%st",
            "Cpu(s):  5.0%us,  1.0%sy,  0.0%ni, 94.0%id,  0.0%wa,  0.0%hi,  0.0%si,  0.0%st",
            "Cpu(s):  3.0%us,  0.8%sy,  0.0%ni, 96.2%id,  0.0%wa,  0.0%hi,  0.0%si,  0.0%st",
        ];
        let samples = parse_top_idle_samples(lines).unwrap();
        assert_eq!(samples, vec![95.6, 94.0, 96.2]);
        assert_eq!(mean_busy_percent(&samples).unwrap(), 4.73);
    }

    #[test]
    fn test_parse_top_idle_samples_skips_blank_lines() {
        let lines = ["boot line", "", "Cpu(s): 0.0%ni, 80.0%id,", "   "];
        assert_eq!(parse_top_idle_samples(lines).unwrap(), vec![80.0]);
    }

    #[test]
    fn test_parse_top_idle_samples_only_first_line() {
        let err = parse_top_idle_samples(["Cpu(s): 0.0%ni, 80.0%id,"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSamplesCollected);
    }

    #[test]
    fn test_parse_top_idle_samples_no_output() {
        let empty: Vec<String> = Vec::new();
        let err = parse_top_idle_samples(empty).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSamplesCollected);
    }

    #[test]
    fn test_parse_top_idle_samples_non_finite() {
        let err = parse_top_idle_samples(["boot", "Cpu(s): 0.0%ni, inf%id,"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);

        let err = parse_top_idle_samples(["boot", "Cpu(s): 0.0%ni, NaN%id,"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_mean_busy_percent_empty() {
        let err = mean_busy_percent(&[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSamplesCollected);
    }

    #[test]
    fn test_parse_free_memory_line() {
        let mem = parse_free_memory_line("-/+ buffers/cache:     120    1808").unwrap();
        assert_eq!(mem.used_mb, 120.0);
        assert_eq!(mem.available_mb, 1808.0);
    }

    #[test]
    fn test_parse_free_memory_line_two_tokens() {
        let mem = parse_free_memory_line("  512\t2048  ").unwrap();
        assert_eq!(mem.used_mb, 512.0);
        assert_eq!(mem.available_mb, 2048.0);
    }

    #[test]
    fn test_parse_free_memory_line_too_few_tokens() {
        let err = parse_free_memory_line("1808").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteMemorySample);
    }

    #[test]
    fn test_parse_free_memory_line_malformed() {
        let err = parse_free_memory_line("-/+ buffers/cache: used free").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_parse_free_memory_line_non_finite() {
        let err = parse_free_memory_line("-/+ buffers/cache: 120 infinity").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedValue);
    }

    #[test]
    fn test_parse_linux_memory_first_non_empty_line() {
        let lines = ["", "-/+ buffers/cache:  300  700", "Swap: 0 0 0"];
        let mem = parse_linux_memory(lines).unwrap();
        assert_eq!(mem.used_mb, 300.0);
        assert_eq!(mem.available_mb, 700.0);
    }

    #[test]
    fn test_parse_linux_memory_no_output() {
        let err = parse_linux_memory(["", "  "]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoOutputProduced);
    }
}
