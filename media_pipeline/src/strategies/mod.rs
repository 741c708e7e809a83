//! Converter Strategies (4.E): four conversion paths plus the Promotion
//! sequence that moves a successful temp output into place.

pub mod image_efficiency;
pub mod image_quality;
pub mod video_efficiency;
pub mod video_quality;

use std::path::PathBuf;

use filetime::{set_file_times, FileTime};
use tracing::{info, warn};

use crate::backup::create_backup;
use crate::cancel::CancellationToken;
use crate::capabilities::ToolCapabilities;
use crate::config::{Config, Mode};
use crate::error::{PipelineError, Result};
use crate::metadata::preserve_metadata;
use crate::task::{ConversionResult, Decision, FileTask, MediaKind, QualityLevel};

/// What a strategy hands back to `promote` on success: the already-written
/// temp file and the tag describing how it was produced.
pub struct StrategyOutput {
    pub temp_path: PathBuf,
    pub tag: String,
}

/// The mode actually applied to one task: in `Auto`, Quality when the task's
/// quality is at least Medium, else Efficiency (4.E).
pub fn effective_mode(configured: Mode, task_quality: QualityLevel) -> Mode {
    match configured {
        Mode::Auto => {
            if task_quality.at_least_medium() {
                Mode::Quality
            } else {
                Mode::Efficiency
            }
        }
        other => other,
    }
}

/// Dispatches `task` to the right strategy, then promotes the result.
/// Returns a fully populated `ConversionResult` in all cases except `Err`,
/// which the caller's retry loop decides whether to retry.
pub fn run_strategy(
    task: &FileTask,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
) -> Result<ConversionResult> {
    let temp_dir = task
        .temp_dir
        .clone()
        .ok_or_else(|| PipelineError::UnsupportedMedia {
            path: task.path.clone(),
            reason: "no temp directory allocated for task",
        })?;

    let mode = effective_mode(config.mode, task.quality);

    let output = match (task.media_kind, mode) {
        (MediaKind::StaticImage, Mode::Quality) => {
            image_quality::convert(task, &temp_dir, caps, cancel)?
        }
        (MediaKind::AnimatedImage, Mode::Quality) => {
            image_quality::convert(task, &temp_dir, caps, cancel)?
        }
        (MediaKind::StaticImage, Mode::Efficiency) => {
            image_efficiency::convert(task, &temp_dir, cancel)?
        }
        (MediaKind::AnimatedImage, Mode::Efficiency) => {
            image_efficiency::convert(task, &temp_dir, cancel)?
        }
        (MediaKind::Video, Mode::Quality) => {
            video_quality::convert(task, &temp_dir, config, caps, cancel)?
        }
        (MediaKind::Video, Mode::Efficiency) => {
            video_efficiency::convert(task, &temp_dir, config, caps, cancel)?
        }
        (_, Mode::Auto) => unreachable!("effective_mode never returns Auto"),
    };

    promote(task, output, config, cancel)
}

/// Step order, per 4.E: (1) backup, (2) metadata preserve, (3) atomic
/// rename, (4) unlink source if the extension changed, (5) restore mtime.
/// The sentinel itself is written by the aggregation consumer, once for
/// this `ConversionResult` along with every other decision. If anything
/// after backup fails, the partially created final file is removed and the
/// original (untouched since backup succeeded first) is left in place.
fn promote(
    task: &FileTask,
    output: StrategyOutput,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ConversionResult> {
    let src = &task.path;
    let original_meta = std::fs::metadata(src)?;
    let original_mtime = FileTime::from_last_modification_time(&original_meta);
    let new_size = std::fs::metadata(&output.temp_path)?.len();

    if config.enable_backups && !create_backup(src, &config.backup_dir) {
        let _ = std::fs::remove_file(&output.temp_path);
        return Err(PipelineError::BackupFailed {
            path: src.clone(),
            reason: "create_backup returned false".to_string(),
        });
    }

    preserve_metadata(src, &output.temp_path, cancel);

    let final_path = final_path_for(src, &output.temp_path);
    if let Err(e) = std::fs::rename(&output.temp_path, &final_path) {
        let _ = std::fs::remove_file(&output.temp_path);
        return Err(PipelineError::RenameFailed {
            from: output.temp_path.clone(),
            to: final_path.clone(),
            reason: e.to_string(),
        });
    }

    if final_path != *src {
        if let Err(e) = std::fs::remove_file(src) {
            warn!(path = %src.display(), error = %e, "failed to unlink original after promotion");
        }
    }

    if let Err(e) = set_file_times(&final_path, original_mtime, original_mtime) {
        warn!(path = %final_path.display(), error = %e, "failed to restore mtime on promoted file");
    }

    let result = ConversionResult {
        original_path: src.clone(),
        final_path: Some(final_path),
        original_size: task.size_bytes,
        new_size,
        tag: output.tag,
        decision: Decision::Success,
        error: None,
    };

    info!(path = %src.display(), tag = %result.tag, original = task.size_bytes, new = new_size, "promoted");
    Ok(result)
}

fn final_path_for(src: &std::path::Path, temp_path: &std::path::Path) -> PathBuf {
    let new_ext = temp_path.extension().and_then(|e| e.to_str()).unwrap_or("");
    src.with_extension(new_ext)
}
