//! Pipeline metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator for
//! submission outcomes. Without an installed recorder every call is a no-op.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Outcome of one HTTP submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Success,
    /// Non-2xx response
    Rejected,
    /// Request never produced a response
    Transport,
}

impl SubmitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Transport => "transport",
        }
    }
}

/// One line accepted by the router
pub fn record_line_routed() {
    counter!("influxin_lines_total").increment(1);
}

/// One stdout line dropped by the prefix filter
pub fn record_line_skipped(process: &str) {
    counter!("influxin_lines_skipped_total", "process" => process.to_string()).increment(1);
}

/// A batch left the accumulator
///
/// `reason` is one of `size`, `timer` or `shutdown`.
pub fn record_batch_flushed(reason: &'static str, lines: usize) {
    counter!("influxin_batches_flushed_total", "reason" => reason).increment(1);
    histogram!("influxin_batch_lines").record(lines as f64);
}

/// A submission finished
pub fn record_submission(status: SubmitStatus, bytes: usize, latency: Duration) {
    counter!("influxin_submissions_total", "status" => status.as_str()).increment(1);
    counter!("influxin_submitted_bytes_total", "status" => status.as_str())
        .increment(bytes as u64);
    histogram!("influxin_submit_latency_ms").record(latency.as_secs_f64() * 1000.0);
}

/// A supervised child exited
pub fn record_child_exit(process: &str, code: Option<i32>) {
    counter!("influxin_child_exits_total", "process" => process.to_string()).increment(1);
    if let Some(code) = code {
        gauge!("influxin_child_last_exit_code", "process" => process.to_string())
            .set(f64::from(code));
    }
}

/// A supervised child is about to be started again
pub fn record_child_restart(process: &str) {
    counter!("influxin_child_restarts_total", "process" => process.to_string()).increment(1);
}

/// Final counters of one sink, published at shutdown
pub fn record_sink_report(sink: &str, lines_written: u64, failures: u64, peak_queued: usize) {
    let sink = sink.to_string();
    counter!("influxin_sink_lines_written_total", "sink" => sink.clone()).absolute(lines_written);
    counter!("influxin_sink_failures_total", "sink" => sink.clone()).absolute(failures);
    gauge!("influxin_sink_peak_queue", "sink" => sink).set(peak_queued as f64);
}

/// Submission outcome aggregator
///
/// Kept in memory so the binary can print a summary on shutdown.
#[derive(Debug, Clone, Default)]
pub struct SubmissionStats {
    succeeded: u64,
    rejected: u64,
    transport_errors: u64,
    bytes_sent: u64,
    latency_ms: RunningStats,
}

impl SubmissionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one submission and forward it to the metrics facade
    pub fn update(&mut self, status: SubmitStatus, bytes: usize, latency: Duration) {
        match status {
            SubmitStatus::Success => {
                self.succeeded += 1;
                self.bytes_sent += bytes as u64;
            }
            SubmitStatus::Rejected => self.rejected += 1,
            SubmitStatus::Transport => self.transport_errors += 1,
        }
        self.latency_ms.push(latency.as_secs_f64() * 1000.0);
        record_submission(status, bytes, latency);
    }

    pub fn summary(&self) -> SubmissionSummary {
        SubmissionSummary {
            succeeded: self.succeeded,
            rejected: self.rejected,
            transport_errors: self.transport_errors,
            bytes_sent: self.bytes_sent,
            latency_ms: StatsSummary::from(&self.latency_ms),
        }
    }
}

/// Snapshot of [`SubmissionStats`]
#[derive(Debug, Clone, Default)]
pub struct SubmissionSummary {
    pub succeeded: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub bytes_sent: u64,
    pub latency_ms: StatsSummary,
}

impl SubmissionSummary {
    pub fn total(&self) -> u64 {
        self.succeeded + self.rejected + self.transport_errors
    }

    pub fn failed(&self) -> u64 {
        self.rejected + self.transport_errors
    }
}

impl std::fmt::Display for SubmissionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Submission Summary ===")?;
        writeln!(f, "Batches:          {}", self.total())?;
        writeln!(f, "  succeeded:      {}", self.succeeded)?;
        writeln!(f, "  rejected:       {}", self.rejected)?;
        writeln!(f, "  transport err:  {}", self.transport_errors)?;
        writeln!(f, "Bytes sent:       {}", self.bytes_sent)?;
        write!(f, "Latency (ms):     {}", self.latency_ms)
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_submission_stats_counts_by_status() {
        let mut stats = SubmissionStats::new();
        stats.update(SubmitStatus::Success, 100, Duration::from_millis(10));
        stats.update(SubmitStatus::Success, 50, Duration::from_millis(30));
        stats.update(SubmitStatus::Rejected, 70, Duration::from_millis(5));
        stats.update(SubmitStatus::Transport, 70, Duration::from_millis(5));

        let summary = stats.summary();
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.bytes_sent, 150);
        assert_eq!(summary.latency_ms.count, 4);
        assert!((summary.latency_ms.max - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_display() {
        let summary = SubmissionStats::new().summary();
        let text = summary.to_string();
        assert!(text.contains("Batches:          0"));
        assert!(text.contains("N/A"));
    }
}
