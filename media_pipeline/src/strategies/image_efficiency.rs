//! Image × Efficiency (4.E): lossless-first, then a quality-ladder descent.

use std::path::{Path, PathBuf};

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::runner::{self, conversion_timeout};
use crate::strategies::StrategyOutput;
use crate::task::{FileTask, QualityLevel};

/// Descent ladder by `QualityLevel`, per 4.E — highest quality first, the
/// loop below still compares every candidate and keeps the smallest.
pub fn quality_ladder(level: QualityLevel) -> [u8; 3] {
    match level {
        QualityLevel::ExtremeHigh => [95, 90, 85],
        QualityLevel::High => [85, 80, 75],
        QualityLevel::Medium => [75, 70, 65],
        QualityLevel::Low => [65, 60, 55],
        QualityLevel::ExtremeLow => [55, 50, 45],
    }
}

pub fn convert(task: &FileTask, temp_dir: &Path, cancel: &CancellationToken) -> Result<StrategyOutput> {
    let timeout = conversion_timeout(task.size_bytes);

    let lossless_dst = temp_dir.join("lossless.avif");
    if runner::run(
        "avifenc",
        &[
            "--lossless".to_string(),
            safe_path_arg(&task.path).into_owned(),
            safe_path_arg(&lossless_dst).into_owned(),
        ],
        cancel,
        timeout,
    )
    .is_ok()
    {
        if let Ok(meta) = std::fs::metadata(&lossless_dst) {
            if meta.len() < task.size_bytes {
                return Ok(StrategyOutput {
                    temp_path: lossless_dst,
                    tag: "AVIF-Lossless".to_string(),
                });
            }
        }
    }
    let _ = std::fs::remove_file(&lossless_dst);

    let mut best: Option<(PathBuf, u64)> = None;
    for (i, q) in quality_ladder(task.quality).iter().enumerate() {
        let candidate = temp_dir.join(format!("candidate_{i}.avif"));
        let ran = runner::run(
            "avifenc",
            &[
                "-q".to_string(),
                q.to_string(),
                safe_path_arg(&task.path).into_owned(),
                safe_path_arg(&candidate).into_owned(),
            ],
            cancel,
            timeout,
        )
        .is_ok();

        if !ran {
            continue;
        }

        let Ok(meta) = std::fs::metadata(&candidate) else {
            continue;
        };
        let size = meta.len();
        if size >= task.size_bytes {
            let _ = std::fs::remove_file(&candidate);
            continue;
        }

        match &best {
            Some((_, best_size)) if size >= *best_size => {
                let _ = std::fs::remove_file(&candidate);
            }
            Some((old_path, _)) => {
                let _ = std::fs::remove_file(old_path);
                best = Some((candidate, size));
            }
            None => best = Some((candidate, size)),
        }
    }

    match best {
        Some((path, _)) => Ok(StrategyOutput {
            temp_path: path,
            tag: "AVIF-Optimized".to_string(),
        }),
        None => Err(PipelineError::NoOptimalCandidate {
            path: task.path.clone(),
        }),
    }
}
