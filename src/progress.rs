//! Global byte-progress counter, interactive progress bar, and verbose
//! throughput logging (§4.8, §7).

use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Log a throughput line roughly every 128 MiB of verbose-mode progress,
/// matching the original source's periodic logging cadence.
const VERBOSE_LOG_INTERVAL_BYTES: u64 = 128 * 1024 * 1024;

/// Process-wide byte counter shared by every file's reader. Drives both the
/// interactive progress bar and the periodic verbose log line.
pub struct Progress {
    total_bytes: Arc<AtomicU64>,
    last_logged: AtomicU64,
    started: Instant,
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl Progress {
    /// `expected_total_bytes` drives the progress bar's percentage; `None`
    /// draws a spinner instead of a bar when the total is unknown up front.
    pub fn new(expected_total_bytes: Option<u64>, verbose: bool) -> Self {
        let bar = if std::io::stdout().is_terminal() {
            let bar = match expected_total_bytes {
                Some(total) => {
                    let bar = ProgressBar::new(total);
                    bar.set_style(
                        ProgressStyle::with_template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                        )
                        .unwrap()
                        .progress_chars("##-"),
                    );
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(
                        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {bytes} imported")
                            .unwrap(),
                    );
                    bar
                }
            };
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            None
        };

        Self {
            total_bytes: Arc::new(AtomicU64::new(0)),
            last_logged: AtomicU64::new(0),
            started: Instant::now(),
            bar,
            verbose,
        }
    }

    pub fn counter(&self) -> Arc<AtomicU64> {
        self.total_bytes.clone()
    }

    /// Record `n` freshly-read bytes, updating the bar and emitting a
    /// verbose throughput line every `VERBOSE_LOG_INTERVAL_BYTES`.
    pub fn add_bytes(&self, n: u64) {
        let total = self.total_bytes.fetch_add(n, Ordering::Relaxed) + n;
        if let Some(bar) = &self.bar {
            bar.set_position(total);
        }
        if self.verbose {
            let last = self.last_logged.load(Ordering::Relaxed);
            if total - last >= VERBOSE_LOG_INTERVAL_BYTES
                && self
                    .last_logged
                    .compare_exchange(last, total, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                let elapsed = self.started.elapsed().as_secs_f64().max(1e-6);
                let rate = total as f64 / elapsed;
                tracing::info!(total_bytes = total, rate_bytes_per_sec = rate, "import progress");
            }
        }
    }

    /// Final summary report once every file has finished (§4.7 step 6).
    pub fn finish(&self) {
        let total = self.total_bytes.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed();
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        let rate = total as f64 / elapsed.as_secs_f64().max(1e-6);
        tracing::info!(
            total_bytes = total,
            elapsed_secs = elapsed.as_secs_f64(),
            rate_bytes_per_sec = rate,
            "import finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_bytes_accumulates() {
        let progress = Progress::new(None, false);
        progress.add_bytes(100);
        progress.add_bytes(50);
        assert_eq!(progress.counter().load(Ordering::Relaxed), 150);
    }
}
