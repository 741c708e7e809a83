//! Per-file repair step (4.H), run before conversion when the batch prompt
//! decision is `Repair`. Concurrency is gated by a fixed 3-permit semaphore
//! independent of `concurrent_jobs`, acquired by the caller.

use std::path::Path;

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::runner::{self, conversion_timeout};
use crate::task::MediaKind;

/// Repairs `path` in place: images get an auto-level+enhance pass through
/// the imaging tool; videos get a stream-copy remux that ignores unknown
/// streams. Failure here is fatal for the task (`FAIL_REPAIR`), never
/// silently skipped, since a repair the user explicitly asked for that
/// doesn't happen would be a silent data-quality regression.
pub fn repair(path: &Path, media_kind: MediaKind, size_bytes: u64, cancel: &CancellationToken) -> Result<()> {
    let timeout = conversion_timeout(size_bytes);
    let repaired = path.with_extension("repair.tmp");

    let result = match media_kind {
        MediaKind::StaticImage | MediaKind::AnimatedImage => runner::run(
            "convert",
            &[
                safe_path_arg(&path).into_owned(),
                "-auto-level".to_string(),
                "-enhance".to_string(),
                safe_path_arg(&repaired).into_owned(),
            ],
            cancel,
            timeout,
        ),
        MediaKind::Video => runner::run(
            "ffmpeg",
            &[
                "-y".to_string(),
                "-err_detect".to_string(),
                "ignore_err".to_string(),
                "-i".to_string(),
                safe_path_arg(&path).into_owned(),
                "-c".to_string(),
                "copy".to_string(),
                "-map".to_string(),
                "0".to_string(),
                "-ignore_unknown".to_string(),
                safe_path_arg(&repaired).into_owned(),
            ],
            cancel,
            timeout,
        ),
    };

    if let Err(e) = result {
        let _ = std::fs::remove_file(&repaired);
        return Err(PipelineError::Runner {
            source: e,
            file_path: Some(path.to_path_buf()),
        });
    }

    std::fs::rename(&repaired, path).map_err(|e| PipelineError::Io {
        path: Some(path.to_path_buf()),
        source: e,
    })
}
