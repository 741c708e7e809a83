//! Quality Assessor (4.C): maps a probed file to one of five `QualityLevel`
//! buckets via cheap heuristics, never full decode passes.

use std::path::Path;

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::config::QualityThresholds;
use crate::probe::VideoCodec;
use crate::runner;
use crate::task::QualityLevel;

const EXTREME_LOW_SIZE_BYTES: u64 = 5 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageMetrics {
    pub width: u32,
    pub height: u32,
    pub encoded_quality: Option<u32>,
    pub entropy: f64,
    pub is_jpeg: bool,
    pub secondary_quality: Option<u32>,
}

/// Reads width/height/quality from the metadata tool and estimates entropy
/// from the file's own byte distribution (no pixel decode needed).
pub fn probe_image_metrics(
    path: &Path,
    mime: &str,
    cancel: &CancellationToken,
) -> Option<ImageMetrics> {
    let out = runner::run(
        "exiftool",
        &[
            "-n".to_string(),
            "-s3".to_string(),
            "-ImageWidth".to_string(),
            "-ImageHeight".to_string(),
            "-Quality".to_string(),
            safe_path_arg(&path).into_owned(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()?;

    let mut lines = out.lines();
    let width: u32 = lines.next()?.trim().parse().ok()?;
    let height: u32 = lines.next()?.trim().parse().ok()?;
    let encoded_quality = lines.next().and_then(|l| l.trim().parse().ok());

    let entropy = byte_entropy(path).unwrap_or(8.0);

    Some(ImageMetrics {
        width,
        height,
        encoded_quality,
        entropy,
        is_jpeg: mime == "image/jpeg",
        secondary_quality: encoded_quality,
    })
}

/// Shannon entropy (bits) of the file's raw byte distribution, capped at 8.
fn byte_entropy(path: &Path) -> Option<f64> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.is_empty() {
        return Some(0.0);
    }
    let mut histogram = [0u64; 256];
    for b in &bytes {
        histogram[*b as usize] += 1;
    }
    let len = bytes.len() as f64;
    let entropy = histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum::<f64>();
    Some(entropy.clamp(0.0, 8.0))
}

/// Image half of 4.C: `ratio`/`score` formula, bucketed by megapixels and
/// configured thresholds.
pub fn assess_image_quality(
    metrics: &ImageMetrics,
    size_bytes: u64,
    thresholds: &QualityThresholds,
) -> QualityLevel {
    if size_bytes < EXTREME_LOW_SIZE_BYTES {
        return QualityLevel::ExtremeLow;
    }

    let megapixels = (metrics.width as f64 * metrics.height as f64) / 1_000_000.0;
    let size_kib = size_bytes as f64 / 1024.0;
    let quality = metrics.encoded_quality.unwrap_or(75) as f64;

    let ratio = (size_kib / megapixels.max(0.000_001)) / (110.0 - quality).max(1.0);
    let compression_factor = if metrics.is_jpeg { 0.8 } else { 1.0 };
    let artifact_factor = match metrics.secondary_quality {
        Some(q) if q < 80 => 0.7,
        _ => 1.0,
    };
    let score = ratio * (metrics.entropy / 8.0) * compression_factor * artifact_factor;

    if megapixels > 12.0 && score > thresholds.extreme_high * 100.0 {
        QualityLevel::ExtremeHigh
    } else if megapixels > 4.0 && score > thresholds.high * 50.0 {
        QualityLevel::High
    } else if megapixels > 1.0 && score > thresholds.medium * 20.0 {
        QualityLevel::Medium
    } else if megapixels > 0.1 && score > thresholds.low * 5.0 {
        QualityLevel::Low
    } else {
        QualityLevel::ExtremeLow
    }
}

/// A single decoded frame's noise/blur proxies, read via ffmpeg filters
/// rather than a full in-process decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProxies {
    pub noise_mean: f64,
    pub blur_amplitude: f64,
}

pub fn probe_frame_proxies(path: &Path, cancel: &CancellationToken) -> Option<FrameProxies> {
    let noise_out = runner::run(
        "ffmpeg",
        &[
            "-v".to_string(),
            "info".to_string(),
            "-i".to_string(),
            safe_path_arg(&path).into_owned(),
            "-vf".to_string(),
            "select=eq(n\\,0),signalstats,metadata=print:file=-".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()?;
    let noise_mean = parse_metadata_value(&noise_out, "lavfi.signalstats.TOUT").unwrap_or(0.0);

    let blur_out = runner::run(
        "ffmpeg",
        &[
            "-v".to_string(),
            "info".to_string(),
            "-i".to_string(),
            safe_path_arg(&path).into_owned(),
            "-vf".to_string(),
            "select=eq(n\\,0),blurdetect,metadata=print:file=-".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ],
        cancel,
        runner::probe_timeout(),
    )
    .ok()?;
    let blur_amplitude = parse_metadata_value(&blur_out, "lavfi.blur").unwrap_or(1.0);

    Some(FrameProxies {
        noise_mean,
        blur_amplitude,
    })
}

fn parse_metadata_value(output: &str, key: &str) -> Option<f64> {
    let needle = format!("{key}=");
    let idx = output.find(&needle)?;
    let rest = &output[idx + needle.len()..];
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    rest[..end].trim().parse().ok()
}

/// Video half of 4.C: `bpp`/`bpp'` adjustment, bucketed in threshold order.
/// Any probe failure (no stream info) yields ExtremeLow, never an
/// unassessed state, so the file still surfaces in the low-quality batch
/// prompt rather than silently skipping assessment.
pub fn assess_video_quality(
    width: u32,
    height: u32,
    fps: f64,
    bitrate: u64,
    codec: VideoCodec,
    proxies: Option<FrameProxies>,
    size_bytes: u64,
    thresholds: &QualityThresholds,
) -> QualityLevel {
    if size_bytes < EXTREME_LOW_SIZE_BYTES {
        return QualityLevel::ExtremeLow;
    }

    let denom = (width as f64) * (height as f64) * fps;
    if denom <= 0.0 {
        return QualityLevel::ExtremeLow;
    }

    let bpp = bitrate as f64 / denom;
    let proxies = proxies.unwrap_or_default();
    let codec_factor = codec.legacy_codec_factor();
    let blur_factor = if proxies.blur_amplitude < 0.1 { 0.6 } else { 1.0 };
    let bpp_adjusted = bpp / (1.0 + proxies.noise_mean / 100.0) * blur_factor * codec_factor;

    if bpp_adjusted > thresholds.extreme_high {
        QualityLevel::ExtremeHigh
    } else if bpp_adjusted > thresholds.high {
        QualityLevel::High
    } else if bpp_adjusted > thresholds.medium {
        QualityLevel::Medium
    } else if bpp_adjusted > thresholds.low {
        QualityLevel::Low
    } else {
        QualityLevel::ExtremeLow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> QualityThresholds {
        QualityThresholds::default()
    }

    #[test]
    fn tiny_file_is_extreme_low() {
        let metrics = ImageMetrics {
            width: 4000,
            height: 3000,
            encoded_quality: Some(95),
            entropy: 7.5,
            is_jpeg: false,
            secondary_quality: Some(95),
        };
        assert_eq!(
            assess_image_quality(&metrics, 100, &thresholds()),
            QualityLevel::ExtremeLow
        );
    }

    #[test]
    fn high_megapixel_high_entropy_is_extreme_high() {
        let metrics = ImageMetrics {
            width: 6000,
            height: 4000,
            encoded_quality: Some(100),
            entropy: 8.0,
            is_jpeg: false,
            secondary_quality: Some(100),
        };
        let level = assess_image_quality(&metrics, 50_000_000, &thresholds());
        assert_eq!(level, QualityLevel::ExtremeHigh);
    }

    #[test]
    fn low_entropy_jpeg_small_file_buckets_low() {
        let metrics = ImageMetrics {
            width: 1200,
            height: 900,
            encoded_quality: Some(60),
            entropy: 2.0,
            is_jpeg: true,
            secondary_quality: Some(60),
        };
        let level = assess_image_quality(&metrics, 40_000, &thresholds());
        assert!(level <= QualityLevel::Medium);
    }

    #[test]
    fn video_zero_denominator_is_extreme_low() {
        let level = assess_video_quality(
            0,
            0,
            0.0,
            1_000_000,
            VideoCodec::H264,
            None,
            10_000_000,
            &thresholds(),
        );
        assert_eq!(level, QualityLevel::ExtremeLow);
    }

    #[test]
    fn video_tiny_file_is_extreme_low() {
        let level = assess_video_quality(
            1920,
            1080,
            30.0,
            1_000_000,
            VideoCodec::Hevc,
            None,
            100,
            &thresholds(),
        );
        assert_eq!(level, QualityLevel::ExtremeLow);
    }

    #[test]
    fn legacy_codec_pushes_bpp_higher() {
        let h264 = assess_video_quality(
            1920,
            1080,
            30.0,
            20_000_000,
            VideoCodec::H264,
            None,
            50_000_000,
            &thresholds(),
        );
        let av1 = assess_video_quality(
            1920,
            1080,
            30.0,
            20_000_000,
            VideoCodec::Av1,
            None,
            50_000_000,
            &thresholds(),
        );
        assert!(h264 >= av1);
    }

    #[test]
    fn byte_entropy_of_empty_is_zero() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(byte_entropy(tmp.path()), Some(0.0));
    }

    #[test]
    fn parse_metadata_value_extracts_float() {
        let sample = "frame:0 pts:0\nlavfi.signalstats.TOUT=12.5\nlavfi.blur=0.05\n";
        assert_eq!(
            parse_metadata_value(sample, "lavfi.signalstats.TOUT"),
            Some(12.5)
        );
        assert_eq!(parse_metadata_value(sample, "lavfi.blur"), Some(0.05));
        assert_eq!(parse_metadata_value(sample, "missing.key"), None);
    }
}
