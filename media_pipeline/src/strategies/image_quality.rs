//! Image × Quality (4.E): lossless-only conversion.

use std::path::{Path, PathBuf};

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::capabilities::ToolCapabilities;
use crate::error::Result;
use crate::runner::{self, conversion_timeout};
use crate::strategies::StrategyOutput;
use crate::task::{FileTask, MediaKind};

const JXL_LARGE_SOURCE_BYTES: u64 = 5 * 1024 * 1024;

pub fn convert(
    task: &FileTask,
    temp_dir: &Path,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
) -> Result<StrategyOutput> {
    let timeout = conversion_timeout(task.size_bytes);

    if task.media_kind == MediaKind::AnimatedImage {
        return lossless_avif(&task.path, temp_dir, cancel, timeout);
    }

    if caps.has_jxl_encoder {
        return lossless_jxl(task, temp_dir, cancel, timeout);
    }

    lossless_avif(&task.path, temp_dir, cancel, timeout)
}

fn lossless_jxl(
    task: &FileTask,
    temp_dir: &Path,
    cancel: &CancellationToken,
    timeout: std::time::Duration,
) -> Result<StrategyOutput> {
    let dst = temp_dir.join("out.jxl");
    let effort = if task.size_bytes > JXL_LARGE_SOURCE_BYTES {
        "9"
    } else {
        "7"
    };

    let mut args = vec![
        safe_path_arg(&task.path).into_owned(),
        safe_path_arg(&dst).into_owned(),
        "--distance=0".to_string(),
        format!("--effort={effort}"),
    ];
    if task.mime_type == "image/jpeg" {
        args.push("--lossless_jpeg=1".to_string());
    }

    runner::run("cjxl", &args, cancel, timeout)?;

    Ok(StrategyOutput {
        temp_path: dst,
        tag: "JXL-Lossless".to_string(),
    })
}

fn lossless_avif(
    src: &Path,
    temp_dir: &Path,
    cancel: &CancellationToken,
    timeout: std::time::Duration,
) -> Result<StrategyOutput> {
    let dst = temp_dir.join("out.avif");
    runner::run(
        "avifenc",
        &[
            "--lossless".to_string(),
            safe_path_arg(&src).into_owned(),
            safe_path_arg(&dst).into_owned(),
        ],
        cancel,
        timeout,
    )?;

    Ok(StrategyOutput {
        temp_path: dst,
        tag: "AVIF-Lossless".to_string(),
    })
}
