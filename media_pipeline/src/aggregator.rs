//! Aggregator (4.J): atomic run-wide counters, updated by the single
//! result-consuming thread, read by the progress UI and the end-of-run
//! report.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Mode;
use crate::task::{ConversionResult, Decision, QualityLevel};

#[derive(Debug, Default)]
pub struct Counters {
    pub files_found: AtomicU64,
    pub files_assessed: AtomicU64,
    pub total_to_process: AtomicU64,
    pub processed: AtomicU64,
    pub success: AtomicU64,
    pub fail: AtomicU64,
    pub skip: AtomicU64,
    pub delete: AtomicU64,
    pub resumed: AtomicU64,
    pub retry_success: AtomicU64,
    pub smart_decisions: AtomicU64,
    pub lossless_wins: AtomicU64,
    pub total_decreased: AtomicU64,
    pub total_increased: AtomicU64,
    pub extreme_low_count: AtomicU64,
    pub low_count: AtomicU64,
    pub medium_count: AtomicU64,
    pub high_count: AtomicU64,
    pub extreme_high_count: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_quality_bucket(&self, level: QualityLevel) {
        let counter = match level {
            QualityLevel::ExtremeLow => &self.extreme_low_count,
            QualityLevel::Low => &self.low_count,
            QualityLevel::Medium => &self.medium_count,
            QualityLevel::High => &self.high_count,
            QualityLevel::ExtremeHigh => &self.extreme_high_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Applies one task's outcome. `attempt` is the retry loop's attempt
    /// index the result succeeded on (0 if it succeeded on the first try);
    /// `mode` is the effective mode actually applied to the task.
    pub fn record_result(&self, result: &ConversionResult, attempt: u32, mode: Mode) {
        self.processed.fetch_add(1, Ordering::Relaxed);

        match result.decision {
            Decision::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
                if attempt > 0 {
                    self.retry_success.fetch_add(1, Ordering::Relaxed);
                }
                if mode != Mode::Quality {
                    self.smart_decisions.fetch_add(1, Ordering::Relaxed);
                }
                if result.is_lossless_win() {
                    self.lossless_wins.fetch_add(1, Ordering::Relaxed);
                }
                if result.new_size < result.original_size {
                    self.total_decreased
                        .fetch_add(result.original_size - result.new_size, Ordering::Relaxed);
                } else if result.new_size > result.original_size {
                    self.total_increased
                        .fetch_add(result.new_size - result.original_size, Ordering::Relaxed);
                }
            }
            Decision::DeleteLowBatch => {
                self.delete.fetch_add(1, Ordering::Relaxed);
            }
            Decision::SkipUnsupported | Decision::SkipNoOptimal | Decision::SkipLowBatch => {
                self.skip.fetch_add(1, Ordering::Relaxed);
            }
            Decision::FailBackup
            | Decision::FailRename
            | Decision::FailRunner
            | Decision::FailCancelled
            | Decision::FailIo
            | Decision::FailRepair => {
                self.fail.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_resumed(&self) {
        self.resumed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn success(tag: &str, original: u64, new: u64) -> ConversionResult {
        ConversionResult {
            original_path: PathBuf::from("/a.jpg"),
            final_path: Some(PathBuf::from("/a.avif")),
            original_size: original,
            new_size: new,
            tag: tag.to_string(),
            decision: Decision::Success,
            error: None,
        }
    }

    #[test]
    fn lossless_win_requires_tag_and_shrink() {
        let counters = Counters::new();
        counters.record_result(&success("AVIF-Lossless", 1000, 900), 0, Mode::Quality);
        assert_eq!(counters.lossless_wins.load(Ordering::Relaxed), 1);

        let counters = Counters::new();
        counters.record_result(&success("AVIF-Lossless", 1000, 1000), 0, Mode::Quality);
        assert_eq!(counters.lossless_wins.load(Ordering::Relaxed), 0);

        let counters = Counters::new();
        counters.record_result(&success("AVIF-Optimized", 1000, 900), 0, Mode::Quality);
        assert_eq!(counters.lossless_wins.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn smart_decisions_exclude_quality_mode() {
        let counters = Counters::new();
        counters.record_result(&success("AVIF-Optimized", 1000, 900), 0, Mode::Efficiency);
        counters.record_result(&success("JXL-Lossless", 1000, 900), 0, Mode::Quality);
        assert_eq!(counters.smart_decisions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn retry_success_only_counted_on_nonzero_attempt() {
        let counters = Counters::new();
        counters.record_result(&success("AVIF-Optimized", 1000, 900), 2, Mode::Auto);
        assert_eq!(counters.retry_success.load(Ordering::Relaxed), 1);
        assert_eq!(counters.success.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn decreased_and_increased_totals_are_never_netted() {
        let counters = Counters::new();
        counters.record_result(&success("AVIF-Optimized", 1000, 900), 0, Mode::Auto);
        counters.record_result(&success("AVIF-Lossless", 500, 600), 0, Mode::Auto);
        assert_eq!(counters.total_decreased.load(Ordering::Relaxed), 100);
        assert_eq!(counters.total_increased.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn fail_and_skip_decisions_bucket_correctly() {
        let counters = Counters::new();
        let mut failed = success("", 10, 0);
        failed.decision = Decision::FailRename;
        counters.record_result(&failed, 0, Mode::Auto);

        let mut skipped = success("", 10, 0);
        skipped.decision = Decision::SkipNoOptimal;
        counters.record_result(&skipped, 0, Mode::Auto);

        assert_eq!(counters.fail.load(Ordering::Relaxed), 1);
        assert_eq!(counters.skip.load(Ordering::Relaxed), 1);
        assert_eq!(counters.processed.load(Ordering::Relaxed), 2);
    }
}
