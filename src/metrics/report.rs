//! Per-pass benchmark report
//!
//! Human-readable output: a summary header, the cumulative latency
//! distribution (one line per populated millisecond cell), and a final
//! requests-per-second line. Quiet mode emits only the final line.

use std::io::{self, Write};

use super::histogram::LatencyHistogram;
use crate::config::LoadConfig;

/// Outcome of one benchmark pass.
pub struct PassReport {
    pub issued: u64,
    pub elapsed_ms: u64,
}

impl PassReport {
    /// Throughput over the pass, computed from issued requests.
    pub fn requests_per_second(&self) -> f64 {
        self.issued as f64 / (self.elapsed_ms.max(1) as f64 / 1000.0)
    }

    /// Print the report to stdout.
    pub fn print(&self, cfg: &LoadConfig, histogram: &LatencyHistogram) {
        let stdout = io::stdout();
        // Report output is best-effort; a closed pipe is not an error
        // worth surfacing after the benchmark already ran.
        let _ = self.write_to(cfg, histogram, &mut stdout.lock());
    }

    pub fn write_to(
        &self,
        cfg: &LoadConfig,
        histogram: &LatencyHistogram,
        out: &mut impl Write,
    ) -> io::Result<()> {
        let reqpersec = self.requests_per_second();

        if !cfg.quiet {
            writeln!(out, "====== Report ======")?;
            writeln!(
                out,
                "  {} requests in {:.3} seconds",
                self.issued,
                self.elapsed_ms as f64 / 1000.0
            )?;
            writeln!(out, "  {:.2} requests per second", reqpersec)?;
            writeln!(out, "  {} parallel clients", cfg.clients)?;
            writeln!(
                out,
                "  payload: {}..{} bytes",
                cfg.datasize_min, cfg.datasize_max
            )?;
            writeln!(out, "  keep alive: {}", cfg.keepalive as u8)?;
            writeln!(out)?;

            let mut seen = 0u64;
            for (ms, count) in histogram.populated() {
                seen += count;
                let perc = seen as f64 * 100.0 / self.issued.max(1) as f64;
                writeln!(out, "{:6.2}% < {} ms", perc, ms + 1)?;
            }
        }
        writeln!(out, "{:.2} requests per second", reqpersec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(cfg: &LoadConfig, hist: &LatencyHistogram, report: &PassReport) -> String {
        let mut buf = Vec::new();
        report.write_to(cfg, hist, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_full_report_shape() {
        let cfg = LoadConfig::default();
        let mut hist = LatencyHistogram::new();
        for _ in 0..6 {
            hist.record(0);
        }
        for _ in 0..4 {
            hist.record(2);
        }
        let report = PassReport {
            issued: 10,
            elapsed_ms: 2000,
        };

        let text = render(&cfg, &hist, &report);
        assert!(text.contains("====== Report ======"));
        assert!(text.contains("10 requests in 2.000 seconds"));
        assert!(text.contains("50 parallel clients"));
        assert!(text.contains("payload: 1..64 bytes"));
        assert!(text.contains("keep alive: 1"));
        assert!(text.contains(" 60.00% < 1 ms"));
        assert!(text.contains("100.00% < 3 ms"));
        assert!(text.ends_with("5.00 requests per second\n"));
    }

    #[test]
    fn test_quiet_report_is_one_line() {
        let mut cfg = LoadConfig::default();
        cfg.quiet = true;
        let hist = LatencyHistogram::new();
        let report = PassReport {
            issued: 100,
            elapsed_ms: 1000,
        };

        let text = render(&cfg, &hist, &report);
        assert_eq!(text, "100.00 requests per second\n");
    }

    #[test]
    fn test_distribution_is_cumulative() {
        let cfg = LoadConfig::default();
        let mut hist = LatencyHistogram::new();
        hist.record(1);
        hist.record(5);
        hist.record(5);
        hist.record(9);
        let report = PassReport {
            issued: 4,
            elapsed_ms: 1000,
        };

        let text = render(&cfg, &hist, &report);
        assert!(text.contains(" 25.00% < 2 ms"));
        assert!(text.contains(" 75.00% < 6 ms"));
        assert!(text.contains("100.00% < 10 ms"));
    }
}
