//! Media Probe (4.B): read-only classification and stream introspection.

use std::path::Path;

use shared_utils::path_safety::safe_path_arg;

use regex_lite_fallback::is_live_photo_name;

use crate::cancel::CancellationToken;
use crate::runner;

const ANIMATED_CAPABLE_MIME: &[&str] = &["image/gif", "image/webp", "image/avif"];

/// First tries the type-sniffing tool (`file --mime-type`); on
/// `application/octet-stream` falls back to an extension map; otherwise
/// `unknown`.
pub fn mime_type(path: &Path, cancel: &CancellationToken) -> String {
    let sniffed = runner::run(
        "file",
        &[
            "--brief".to_string(),
            "--mime-type".to_string(),
            safe_path_arg(&path).into_owned(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()
    .map(|s| s.trim().to_string());

    match sniffed.as_deref() {
        Some("application/octet-stream") | None => {
            extension_mime(path).unwrap_or_else(|| "unknown".to_string())
        }
        Some(other) => other.to_string(),
    }
}

fn extension_mime(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    Some(
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "avif" => "image/avif",
            "heic" | "heif" => "image/heic",
            "tif" | "tiff" => "image/tiff",
            "jxl" => "image/jxl",
            "mp4" | "m4v" => "video/mp4",
            "mov" => "video/quicktime",
            "mkv" => "video/x-matroska",
            "webm" => "video/webm",
            "avi" => "video/x-msvideo",
            _ => return None,
        }
        .to_string(),
    )
}

/// True only for animated-capable containers AND probe-reported frame
/// count > 1.
pub fn is_animated(path: &Path, mime: &str, cancel: &CancellationToken) -> bool {
    if !ANIMATED_CAPABLE_MIME.contains(&mime) {
        return false;
    }
    frame_count(path, cancel).map(|n| n > 1).unwrap_or(false)
}

fn frame_count(path: &Path, cancel: &CancellationToken) -> Option<u32> {
    let out = runner::run(
        "ffprobe",
        &[
            "-v".to_string(),
            "error".to_string(),
            "-count_frames".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=nb_read_frames".to_string(),
            "-print_format".to_string(),
            "csv=p=0".to_string(),
            safe_path_arg(&path).into_owned(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()?;
    out.trim().parse().ok()
}

/// `filename` matches `IMG_E?<4 digits>.HEIC` AND a sibling `.MOV` exists.
pub fn is_live_photo(path: &Path) -> bool {
    let Some(stem_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !is_live_photo_name(stem_name) {
        return false;
    }
    path.with_extension("MOV").exists() || path.with_extension("mov").exists()
}

/// True for the `.MOV`/`.mov` motion half of a live photo: same stem as an
/// `IMG_E?<4 digits>.HEIC` name, and that HEIC file actually exists
/// alongside it. Exists so the motion component is recognized and skipped
/// the same way as the still image half, instead of being converted as an
/// ordinary video.
pub fn is_live_photo_motion(path: &Path) -> bool {
    let is_mov = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mov"))
        .unwrap_or(false);
    if !is_mov {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|n| n.to_str()) else {
        return false;
    };
    ["HEIC", "heic"].iter().any(|ext| {
        let candidate_name = format!("{stem}.{ext}");
        is_live_photo_name(&candidate_name) && path.with_file_name(&candidate_name).exists()
    })
}

/// Metadata tag `ProjectionType ∈ {equirectangular, cubemap}`.
pub fn is_spatial(path: &Path, cancel: &CancellationToken) -> bool {
    let Ok(out) = runner::run(
        "exiftool",
        &[
            "-s3".to_string(),
            "-ProjectionType".to_string(),
            safe_path_arg(&path).into_owned(),
        ],
        cancel,
        runner::probe_timeout(),
    ) else {
        return false;
    };
    let tag = out.trim().to_lowercase();
    tag == "equirectangular" || tag == "cubemap"
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: u64,
    pub codec: VideoCodec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    #[default]
    Other,
    H264,
    Mpeg4,
    Hevc,
    Av1,
}

impl VideoCodec {
    pub fn from_name(name: &str) -> Self {
        match name {
            "h264" => VideoCodec::H264,
            "mpeg4" => VideoCodec::Mpeg4,
            "hevc" | "h265" => VideoCodec::Hevc,
            "av1" => VideoCodec::Av1,
            _ => VideoCodec::Other,
        }
    }

    /// `codec_factor = 1.2` for legacy codecs (H.264, MPEG-4), else 1.0 (4.C).
    pub fn legacy_codec_factor(&self) -> f64 {
        match self {
            VideoCodec::H264 | VideoCodec::Mpeg4 => 1.2,
            _ => 1.0,
        }
    }
}

pub fn video_stream_info(
    path: &Path,
    cancel: &CancellationToken,
) -> Option<VideoStreamInfo> {
    let out = runner::run(
        "ffprobe",
        &[
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height,r_frame_rate,bit_rate,codec_name".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            safe_path_arg(&path).into_owned(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()?;

    let json: serde_json::Value = serde_json::from_str(&out).ok()?;
    let stream = json.get("streams")?.get(0)?;

    let width = stream.get("width")?.as_u64()? as u32;
    let height = stream.get("height")?.as_u64()? as u32;
    let fps = stream
        .get("r_frame_rate")
        .and_then(|v| v.as_str())
        .map(parse_frame_rate)
        .unwrap_or(0.0);
    let bitrate = stream
        .get("bit_rate")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let codec = stream
        .get("codec_name")
        .and_then(|v| v.as_str())
        .map(VideoCodec::from_name)
        .unwrap_or_default();

    Some(VideoStreamInfo {
        width,
        height,
        fps,
        bitrate,
        codec,
    })
}

fn parse_frame_rate(raw: &str) -> f64 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

/// Tiny hand-rolled matcher so the crate doesn't need a regex dependency for
/// one fixed-shape filename pattern: `IMG_E?<4 digits>.HEIC` (case
/// insensitive on the extension).
mod regex_lite_fallback {
    pub fn is_live_photo_name(name: &str) -> bool {
        let Some(stem) = name.rsplit_once('.').map(|(s, ext)| (s, ext)) else {
            return false;
        };
        let (stem, ext) = stem;
        if !ext.eq_ignore_ascii_case("heic") {
            return false;
        }
        let digits = stem
            .strip_prefix("IMG_E")
            .or_else(|| stem.strip_prefix("IMG_"));
        match digits {
            Some(d) => d.len() == 4 && d.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }
}
