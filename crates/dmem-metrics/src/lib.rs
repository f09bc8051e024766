//! Per-operation latency and outcome tracking for buffer workloads.
//!
//! Each worker thread owns an [`OpRecorder`]; recorders are merged once
//! the workload finishes, so the hot path never touches shared state.

use core::fmt;

use hdrhistogram::{AdditionError, CreationError, Histogram};
use thiserror::Error;

/// Highest latency tracked exactly (60s); larger samples are clamped.
pub const MAX_TRACKABLE_NANOS: u64 = 60_000_000_000;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid histogram precision: {0}")]
    Creation(#[from] CreationError),

    #[error("failed to merge histograms: {0}")]
    Merge(#[from] AdditionError),
}

/// Nanosecond latency histogram.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Histogram with 3 significant digits.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, 3)
                .expect("Failed to create histogram"),
        }
    }

    /// Histogram with custom precision (0-5 significant digits).
    pub fn with_precision(sigfig: u8) -> Result<Self, MetricsError> {
        Ok(Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, sigfig)?,
        })
    }

    /// Record a latency in nanoseconds.
    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        self.histogram.saturating_record(nanos.max(1));
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<(), MetricsError> {
        self.histogram.add(&other.histogram)?;
        Ok(())
    }

    /// Value at percentile (0.0 - 100.0).
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        self.histogram.value_at_quantile(percentile / 100.0)
    }

    pub fn p50(&self) -> u64 {
        self.value_at_percentile(50.0)
    }

    pub fn p99(&self) -> u64 {
        self.value_at_percentile(99.0)
    }

    pub fn p999(&self) -> u64 {
        self.value_at_percentile(99.9)
    }

    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    pub fn min(&self) -> u64 {
        self.histogram.min()
    }

    /// Number of samples.
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    /// Snapshot of the headline percentiles.
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            min: self.min(),
            p50: self.p50(),
            p99: self.p99(),
            p999: self.p999(),
            max: self.max(),
        }
    }

    /// Print the distribution, one line per percentile.
    pub fn print_summary(&self, prefix: &str) {
        println!("{prefix} Distribution ({} samples):", self.count());
        for (label, nanos) in [
            ("Min", self.min()),
            ("P50", self.p50()),
            ("P99", self.p99()),
            ("P99.9", self.p999()),
            ("Max", self.max()),
        ] {
            println!("{prefix}   {label:<6} {:>12}", format_latency(nanos));
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Headline percentiles of one histogram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50 {} / p99 {} / p99.9 {} / max {}",
            format_latency(self.p50),
            format_latency(self.p99),
            format_latency(self.p999),
            format_latency(self.max),
        )
    }
}

/// Latency plus success/failure counts for one kind of operation.
#[derive(Default)]
pub struct OpRecorder {
    pub latency: LatencyHistogram,
    pub succeeded: u64,
    pub failed: u64,
}

impl OpRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one operation's outcome and duration.
    #[inline(always)]
    pub fn record(&mut self, ok: bool, nanos: u64) {
        self.latency.record(nanos);
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn merge(&mut self, other: &OpRecorder) -> Result<(), MetricsError> {
        self.latency.merge(&other.latency)?;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        Ok(())
    }
}

/// TSC-backed stopwatch for timing individual operations.
#[derive(Clone)]
pub struct Stopwatch {
    clock: quanta::Clock,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            clock: quanta::Clock::new(),
        }
    }

    /// Raw timestamp; only meaningful relative to another from this clock.
    #[inline(always)]
    pub fn start(&self) -> u64 {
        self.clock.raw()
    }

    /// Nanoseconds since a `start()` timestamp.
    #[inline(always)]
    pub fn elapsed_nanos(&self, start: u64) -> u64 {
        self.clock.delta_as_nanos(start, self.clock.raw())
    }

    /// Run `op` and return its result together with how long it took.
    #[inline(always)]
    pub fn time<T>(&self, op: impl FnOnce() -> T) -> (T, u64) {
        let start = self.start();
        let out = op();
        (out, self.elapsed_nanos(start))
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a latency with a unit suited to its magnitude.
pub fn format_latency(nanos: u64) -> String {
    if nanos < 1_000 {
        format!("{nanos} ns")
    } else if nanos < 1_000_000 {
        format!("{:.2} μs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2} ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2} s", nanos as f64 / 1_000_000_000.0)
    }
}

/// Operations per second, or 0 for an empty interval.
pub fn ops_per_sec(ops: u64, elapsed_nanos: u64) -> f64 {
    if elapsed_nanos == 0 {
        return 0.0;
    }
    ops as f64 * 1_000_000_000.0 / elapsed_nanos as f64
}
