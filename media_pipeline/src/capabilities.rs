//! ToolCapabilities: probed once at startup.

/// The logical external tools the pipeline invokes (§6). Availability is
/// checked once per run via PATH lookup; strategies branch on the resulting
/// capability bits rather than re-probing per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCapabilities {
    pub has_jxl_encoder: bool,
    pub has_av1_encoder: bool,
    pub has_hw_videotoolbox: bool,
}

impl ToolCapabilities {
    pub fn detect() -> Self {
        Self {
            has_jxl_encoder: which::which("cjxl").is_ok(),
            has_av1_encoder: which::which("SvtAv1EncApp").is_ok()
                || ffmpeg_has_encoder("libsvtav1"),
            has_hw_videotoolbox: cfg!(target_os = "macos") && ffmpeg_has_encoder("videotoolbox"),
        }
    }
}

fn ffmpeg_has_encoder(name: &str) -> bool {
    let Ok(output) = std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
    else {
        return false;
    };
    String::from_utf8_lossy(&output.stdout).contains(name)
}

/// The tools the pipeline expects to find on `PATH`, by logical role. Used by
/// the CLI's startup dependency-detection banner (out of core scope, but the
/// names live here since they mirror the capability bits above).
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe", "exiftool", "file", "cjxl"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_does_not_panic() {
        let _ = ToolCapabilities::detect();
    }
}
