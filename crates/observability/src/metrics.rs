//! 扫描指标收集模块
//!
//! 基于 ScanReport 记录扫描结束时的指标，并提供消费侧的在线统计。

use std::time::Duration;

use contracts::{ScanOutcome, ScanReport};
use metrics::{counter, gauge, histogram};

/// 从 ScanReport 记录指标
///
/// 扫描结束 (Completed / Cancelled) 时调用。行级计数器由采集循环实时记录，
/// 这里只补充按扫描聚合的部分。
///
/// # Example
///
/// ```ignore
/// let report = handle.join().await?;
/// observability::metrics::record_scan_report(&report, elapsed);
/// ```
pub fn record_scan_report(report: &ScanReport, elapsed: Duration) {
    counter!("linescan_scans_total", "outcome" => outcome_label(report.outcome)).increment(1);

    gauge!("linescan_last_scan_lines").set(f64::from(report.emitted_lines));
    histogram!("linescan_scan_duration_ms").record(elapsed.as_secs_f64() * 1000.0);

    if report.pending_rows_discarded > 0 {
        counter!("linescan_pending_rows_discarded_total").increment(report.pending_rows_discarded);
    }
    if report.shortfall.is_some() {
        counter!("linescan_short_scans_total").increment(1);
    }
}

/// 记录失败的扫描
pub fn record_scan_failure(kind: &'static str) {
    counter!("linescan_scans_total", "outcome" => "failed").increment(1);
    counter!("linescan_scan_failures_total", "kind" => kind).increment(1);
}

/// 记录一次消费读取
pub fn record_consumer_read(bytes: usize) {
    histogram!("linescan_consumer_read_bytes").record(bytes as f64);
}

fn outcome_label(outcome: ScanOutcome) -> &'static str {
    match outcome {
        ScanOutcome::Completed => "completed",
        ScanOutcome::Cancelled => "cancelled",
    }
}

/// 扫描摘要
///
/// 在内存中汇总一次扫描，便于命令行输出。
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub report: ScanReport,
    pub elapsed: Duration,
    /// 消费侧每次读取的字节数
    pub reads: StatsSummary,
}

impl ScanSummary {
    pub fn new(report: ScanReport, elapsed: Duration, reads: &RunningStats) -> Self {
        Self {
            report,
            elapsed,
            reads: StatsSummary::from(reads),
        }
    }

    /// 输出行速率 (lines/s)
    pub fn lines_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.report.emitted_lines) / secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = &self.report;
        writeln!(f, "=== Scan Summary ===")?;
        writeln!(f, "Outcome: {}", outcome_label(r.outcome))?;
        writeln!(f, "Lines: {}/{}", r.emitted_lines, r.expected_lines)?;
        if let Some(shortfall) = r.shortfall {
            writeln!(f, "Shortfall: {} lines missing", shortfall.missing())?;
        }
        writeln!(
            f,
            "Native lines: {} requested, {} received",
            r.native_lines_requested, r.native_lines_received
        )?;
        writeln!(f, "Requests: {} in {} block(s)", r.requests_issued, r.blocks_started)?;
        writeln!(f, "Bytes written: {}", r.bytes_written)?;
        if r.pending_rows_discarded > 0 {
            writeln!(f, "Pending rows discarded: {}", r.pending_rows_discarded)?;
        }
        writeln!(
            f,
            "Elapsed: {:.1} ms ({:.1} lines/s)",
            self.elapsed.as_secs_f64() * 1000.0,
            self.lines_per_sec()
        )?;
        writeln!(f, "Read size (bytes): {}", self.reads)?;
        Ok(())
    }
}

/// 统计摘要
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
                "min={:.0}, max={:.0}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
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
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
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

    /// 样本方差
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

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
