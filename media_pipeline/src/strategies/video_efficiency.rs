//! Video × Efficiency (4.E): same codec choice as Video × Quality, lossless
//! attempt first, then a CRF-ladder descent relative to `base_crf`.

use std::path::{Path, PathBuf};

use crate::cancel::CancellationToken;
use crate::capabilities::ToolCapabilities;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::runner::{self, conversion_timeout};
use crate::strategies::video_quality::base_args;
use crate::strategies::StrategyOutput;
use crate::task::{FileTask, QualityLevel};
use shared_utils::types::{Av1Encoder, Crf, HevcEncoder};

/// Clamps a ladder-derived CRF value into the chosen encoder's valid range
/// before it reaches the command line, so a ladder offset that overshoots
/// the bound (e.g. a high `base_crf` plus the ExtremeLow ladder's +12) can
/// never produce an encoder error instead of a worse-but-valid encode.
fn clamp_crf(crf: f32, caps: &ToolCapabilities) -> f32 {
    if caps.has_av1_encoder {
        Crf::<Av1Encoder>::clamped(crf).value()
    } else {
        Crf::<HevcEncoder>::clamped(crf).value()
    }
}

/// CRF ladder relative to `base_crf` (`b`), per 4.E.
pub fn crf_ladder(level: QualityLevel, base_crf: f32) -> [f32; 3] {
    let b = base_crf;
    match level {
        QualityLevel::ExtremeHigh => [b - 6.0, b - 3.0, b],
        QualityLevel::High => [b - 3.0, b, b + 3.0],
        QualityLevel::Medium => [b, b + 3.0, b + 6.0],
        QualityLevel::Low => [b + 4.0, b + 7.0, b + 10.0],
        QualityLevel::ExtremeLow => [b + 6.0, b + 9.0, b + 12.0],
    }
}

fn run_with_crf(
    task: &FileTask,
    temp_dir: &Path,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
    crf: f32,
    name: &str,
) -> Option<PathBuf> {
    let dst = temp_dir.join(name);
    let (_, mut args) = base_args(&task.path, &dst, config, caps);
    let dst_pos = args.len() - 1;
    args.insert(dst_pos, "-crf".to_string());
    args.insert(dst_pos + 1, format!("{}", clamp_crf(crf, caps)));

    let timeout = conversion_timeout(task.size_bytes);
    runner::run("ffmpeg", &args, cancel, timeout).ok()?;
    Some(dst)
}

pub fn convert(
    task: &FileTask,
    temp_dir: &Path,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
) -> Result<StrategyOutput> {
    if let Some(dst) = run_with_crf(task, temp_dir, config, caps, cancel, 0.0, "lossless.mov") {
        if let Ok(meta) = std::fs::metadata(&dst) {
            if meta.len() < task.size_bytes {
                return Ok(StrategyOutput {
                    temp_path: dst,
                    tag: "MOV-Lossless".to_string(),
                });
            }
        }
        let _ = std::fs::remove_file(&dst);
    }

    let mut best: Option<(PathBuf, u64)> = None;
    for (i, crf) in crf_ladder(task.quality, config.base_crf).iter().enumerate() {
        let name = format!("candidate_{i}.mov");
        let Some(candidate) = run_with_crf(task, temp_dir, config, caps, cancel, *crf, &name) else {
            continue;
        };

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
            tag: "MOV-Optimized".to_string(),
        }),
        None => Err(PipelineError::NoOptimalCandidate {
            path: task.path.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crf_ladders_match_spec_table() {
        let b = 28.0;
        assert_eq!(
            crf_ladder(QualityLevel::ExtremeHigh, b),
            [22.0, 25.0, 28.0]
        );
        assert_eq!(crf_ladder(QualityLevel::High, b), [25.0, 28.0, 31.0]);
        assert_eq!(crf_ladder(QualityLevel::Medium, b), [28.0, 31.0, 34.0]);
        assert_eq!(crf_ladder(QualityLevel::Low, b), [32.0, 35.0, 38.0]);
        assert_eq!(
            crf_ladder(QualityLevel::ExtremeLow, b),
            [34.0, 37.0, 40.0],
        );
    }

    #[test]
    fn clamp_crf_keeps_in_range_values_unchanged() {
        let caps = ToolCapabilities {
            has_jxl_encoder: false,
            has_av1_encoder: true,
            has_hw_videotoolbox: false,
        };
        assert_eq!(clamp_crf(30.0, &caps), 30.0);
    }

    #[test]
    fn clamp_crf_caps_hevc_ladder_overshoot() {
        let caps = ToolCapabilities {
            has_jxl_encoder: false,
            has_av1_encoder: false,
            has_hw_videotoolbox: false,
        };
        assert_eq!(clamp_crf(60.0, &caps), 51.0);
    }
}
