//! Data model (§3): `FileTask`, `ConversionResult`, and the closed
//! enumerations they're built from. Per §9 "Dynamic typing in source",
//! quality levels and decisions are modeled as enums, never raw strings — the
//! sentinel file is the one place they're serialized to text (see
//! `sentinel.rs`).

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    StaticImage,
    AnimatedImage,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    ExtremeLow,
    Low,
    Medium,
    High,
    ExtremeHigh,
}

impl QualityLevel {
    pub fn at_least_medium(&self) -> bool {
        *self >= QualityLevel::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    NotApplicable,
    Skip,
    Repair,
    Delete,
    Process,
}

/// Workers pull from the reordered channel; lower ordinal sorts first
/// (ExtremeLow tasks get strictly lower `priority()` values than anything
/// else, satisfying 4.G's reorder-goroutine priority).
#[derive(Debug, Clone)]
pub struct FileTask {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
    pub media_kind: MediaKind,
    pub quality: QualityLevel,
    pub batch_decision: BatchDecision,
    pub temp_dir: Option<PathBuf>,
}

impl FileTask {
    pub fn priority(&self) -> u8 {
        if self.quality == QualityLevel::ExtremeLow {
            0
        } else {
            1
        }
    }

    pub fn is_extreme_low(&self) -> bool {
        self.quality == QualityLevel::ExtremeLow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Success,
    SkipUnsupported,
    SkipNoOptimal,
    SkipLowBatch,
    DeleteLowBatch,
    FailBackup,
    FailRename,
    FailRunner,
    FailCancelled,
    FailIo,
    FailRepair,
}

impl Decision {
    /// Per §9 ambiguity #1: a sentinel counts as "done" (skippable on
    /// resume) iff its decision is neither `FAIL_*` nor `SKIP_*`.
    pub fn counts_as_done(&self) -> bool {
        !matches!(self.as_str().split('_').next(), Some("FAIL") | Some("SKIP"))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Success => "SUCCESS",
            Decision::SkipUnsupported => "SKIP_UNSUPPORTED",
            Decision::SkipNoOptimal => "SKIP_NO_OPTIMAL",
            Decision::SkipLowBatch => "SKIP_LOW_BATCH",
            Decision::DeleteLowBatch => "DELETE_LOW_BATCH",
            Decision::FailBackup => "FAIL_BACKUP",
            Decision::FailRename => "FAIL_RENAME",
            Decision::FailRunner => "FAIL_RUNNER",
            Decision::FailCancelled => "FAIL_CANCELLED",
            Decision::FailIo => "FAIL_IO",
            Decision::FailRepair => "FAIL_REPAIR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "SUCCESS" => Decision::Success,
            "SKIP_UNSUPPORTED" => Decision::SkipUnsupported,
            "SKIP_NO_OPTIMAL" => Decision::SkipNoOptimal,
            "SKIP_LOW_BATCH" => Decision::SkipLowBatch,
            "DELETE_LOW_BATCH" => Decision::DeleteLowBatch,
            "FAIL_BACKUP" => Decision::FailBackup,
            "FAIL_RENAME" => Decision::FailRename,
            "FAIL_RUNNER" => Decision::FailRunner,
            "FAIL_CANCELLED" => Decision::FailCancelled,
            "FAIL_IO" => Decision::FailIo,
            "FAIL_REPAIR" => Decision::FailRepair,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub original_path: PathBuf,
    pub final_path: Option<PathBuf>,
    pub original_size: u64,
    pub new_size: u64,
    pub tag: String,
    pub decision: Decision,
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn is_lossless_win(&self) -> bool {
        self.tag.contains("Lossless") && self.new_size < self.original_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_level_ordering() {
        assert!(QualityLevel::Medium > QualityLevel::Low);
        assert!(QualityLevel::Medium.at_least_medium());
        assert!(!QualityLevel::Low.at_least_medium());
    }

    #[test]
    fn decision_done_rule_excludes_fail_and_skip() {
        assert!(Decision::Success.counts_as_done());
        assert!(!Decision::SkipNoOptimal.counts_as_done());
        assert!(!Decision::FailBackup.counts_as_done());
        assert!(Decision::DeleteLowBatch.counts_as_done());
    }

    #[test]
    fn decision_round_trips_through_str() {
        for d in [
            Decision::Success,
            Decision::SkipUnsupported,
            Decision::SkipNoOptimal,
            Decision::SkipLowBatch,
            Decision::DeleteLowBatch,
            Decision::FailBackup,
            Decision::FailRename,
        ] {
            assert_eq!(Decision::from_str(d.as_str()), Some(d));
        }
    }

    #[test]
    fn extreme_low_sorts_first() {
        let mut low = FileTask {
            path: "a".into(),
            size_bytes: 0,
            mime_type: String::new(),
            media_kind: MediaKind::StaticImage,
            quality: QualityLevel::ExtremeLow,
            batch_decision: BatchDecision::NotApplicable,
            temp_dir: None,
        };
        let mut high = low.clone();
        high.quality = QualityLevel::High;
        assert!(low.priority() < high.priority());
        low.quality = QualityLevel::Low;
        assert!(!low.is_extreme_low());
    }
}
