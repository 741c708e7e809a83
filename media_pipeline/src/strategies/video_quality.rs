//! Video × Quality (4.E): lossless MOV via AV1-SVT (preferred) or HEVC.

use std::path::Path;

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::capabilities::ToolCapabilities;
use crate::config::Config;
use crate::error::Result;
use crate::runner::{self, conversion_timeout};
use crate::strategies::StrategyOutput;
use crate::task::FileTask;

pub(super) fn base_args(src: &Path, dst: &Path, config: &Config, caps: &ToolCapabilities) -> (String, Vec<String>) {
    let (encoder, extra) = if caps.has_av1_encoder {
        ("libsvtav1".to_string(), vec![])
    } else {
        ("libx265".to_string(), vec![])
    };

    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        safe_path_arg(&src).into_owned(),
        "-c:v".to_string(),
        encoder.clone(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-c:s".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ];
    args.extend(extra);

    if caps.has_hw_videotoolbox && config.hw_accel {
        args.push("-hwaccel".to_string());
        args.push("videotoolbox".to_string());
    }

    args.push(safe_path_arg(&dst).into_owned());
    (encoder, args)
}

pub fn convert(
    task: &FileTask,
    temp_dir: &Path,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
) -> Result<StrategyOutput> {
    let dst = temp_dir.join("out.mov");
    let (encoder, mut args) = base_args(&task.path, &dst, config, caps);

    let dst_pos = args.len() - 1;
    args.insert(dst_pos, "-crf".to_string());
    args.insert(dst_pos + 1, "0".to_string());

    let timeout = conversion_timeout(task.size_bytes);
    runner::run("ffmpeg", &args, cancel, timeout)?;

    let tag = if encoder == "libsvtav1" {
        "MOV-AV1-Lossless"
    } else {
        "MOV-HEVC-Lossless"
    };

    Ok(StrategyOutput {
        temp_path: dst,
        tag: tag.to_string(),
    })
}
