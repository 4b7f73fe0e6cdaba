//! Progress markers emitted by the transcoder and monotonic reporting.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::fmt;
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

use super::types::ProgressSink;

/// Highest percentage reported while the process is still running.
pub const RUNNING_CEILING: u8 = 99;

static TIME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btime=(\d+):(\d+):(\d+\.\d+)").expect("valid time regex"));

static OUT_TIME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"out_time=(\d+):(\d+):(\d+\.\d+)").expect("valid out_time regex"));

/// Which timestamp convention a transcoder run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMarker {
    /// `time=HH:MM:SS.ff` in the human-readable diagnostic stream.
    Time,
    /// `out_time=HH:MM:SS.ffffff` in `-progress` key/value output.
    OutTime,
}

impl ProgressMarker {
    /// Elapsed media seconds carried by `line`, if it contains the marker.
    pub fn parse_elapsed(&self, line: &str) -> Option<f64> {
        let regex = match self {
            ProgressMarker::Time => &*TIME_MARKER,
            ProgressMarker::OutTime => &*OUT_TIME_MARKER,
        };
        let caps = regex.captures(line)?;
        let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
        let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }
}

/// Whether a probed duration can drive percentages. Runs with an unusable
/// duration report no progress at all.
pub fn is_usable_duration(total: f64) -> bool {
    total.is_finite() && total > 0.0
}

/// `floor(elapsed / total * 100)` clamped to `[0, 99]`.
pub fn percent_of(elapsed: f64, total: f64) -> Option<u8> {
    if !is_usable_duration(total) || !elapsed.is_finite() {
        return None;
    }
    let percent = (elapsed / total * 100.0).floor();
    Some(percent.clamp(0.0, f64::from(RUNNING_CEILING)) as u8)
}

/// Forwards progress to the caller's sink, dropping anything that would
/// move backwards or repeat.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<ProgressSink>,
    last: Arc<AtomicI16>,
}

impl ProgressReporter {
    pub fn new(sink: Option<ProgressSink>) -> Self {
        Self {
            sink,
            last: Arc::new(AtomicI16::new(-1)),
        }
    }

    /// Reporter that only tracks values.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Emits `percent` if it is greater than everything emitted so far.
    pub fn report(&self, percent: u8) -> bool {
        let value = i16::from(percent.min(100));
        let previous = self.last.fetch_max(value, Ordering::SeqCst);
        if value <= previous {
            return false;
        }
        if let Some(sink) = &self.sink {
            sink(value as u8);
        }
        true
    }

    pub fn complete(&self) -> bool {
        self.report(100)
    }

    /// Last emitted value.
    pub fn last(&self) -> Option<u8> {
        u8::try_from(self.last.load(Ordering::SeqCst)).ok()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_sink", &self.sink.is_some())
            .field("last", &self.last())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_parse_time_marker() {
        let line = "frame=  240 fps=60 q=28.0 size=    512kB time=00:01:30.50 bitrate= 46.3kbits/s";
        assert_eq!(ProgressMarker::Time.parse_elapsed(line), Some(90.5));
    }

    #[test]
    fn test_time_marker_ignores_out_time() {
        assert_eq!(
            ProgressMarker::Time.parse_elapsed("out_time=00:00:10.000000"),
            None
        );
    }

    #[test]
    fn test_parse_out_time_marker() {
        assert_eq!(
            ProgressMarker::OutTime.parse_elapsed("out_time=01:00:01.250000"),
            Some(3601.25)
        );
        assert_eq!(
            ProgressMarker::OutTime.parse_elapsed("out_time_ms=60000000"),
            None
        );
    }

    #[test]
    fn test_marker_requires_fraction() {
        assert_eq!(ProgressMarker::Time.parse_elapsed("time=00:00:10"), None);
        assert_eq!(ProgressMarker::Time.parse_elapsed("time=N/A"), None);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(60.0, 120.0), Some(50));
        assert_eq!(percent_of(59.99, 120.0), Some(49));
        assert_eq!(percent_of(0.0, 120.0), Some(0));
        assert_eq!(percent_of(120.0, 120.0), Some(99));
        assert_eq!(percent_of(500.0, 120.0), Some(99));
    }

    #[test]
    fn test_percent_of_unusable_total() {
        assert_eq!(percent_of(10.0, 0.0), None);
        assert_eq!(percent_of(10.0, -3.0), None);
        assert_eq!(percent_of(10.0, f64::NAN), None);
        assert_eq!(percent_of(10.0, f64::INFINITY), None);
    }

    #[test]
    fn test_reporter_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter =
            ProgressReporter::new(Some(Arc::new(move |p: u8| sink.lock().unwrap().push(p))));

        assert!(reporter.report(10));
        assert!(!reporter.report(10));
        assert!(!reporter.report(5));
        assert!(!reporter.report(0));
        assert!(reporter.report(60));
        assert!(reporter.complete());
        assert!(!reporter.complete());

        assert_eq!(*seen.lock().unwrap(), vec![10, 60, 100]);
        assert_eq!(reporter.last(), Some(100));
    }

    #[test]
    fn test_reporter_first_zero_is_emitted() {
        let reporter = ProgressReporter::silent();
        assert_eq!(reporter.last(), None);
        assert!(reporter.report(0));
        assert_eq!(reporter.last(), Some(0));
    }
}
