//! Metadata preservation (4.D, second half).

use std::path::Path;
use std::time::Duration;

use filetime::{set_file_times, FileTime};
use tracing::warn;

use shared_utils::path_safety::safe_path_arg;

use crate::cancel::CancellationToken;
use crate::runner;

const EXIFTOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Copies all EXIF/XMP/ICC metadata from `src` into `dst` via `exiftool`,
/// then force-sets `dst`'s mtime/atime to `src`'s regardless of whether the
/// exiftool call succeeded. The timestamp restore is mandatory, not
/// best-effort: callers rely on it to keep the promoted file's age
/// consistent with the original for downstream tooling.
pub fn preserve_metadata(src: &Path, dst: &Path, cancel: &CancellationToken) {
    let result = runner::run(
        "exiftool",
        &[
            "-tagsfromfile".to_string(),
            safe_path_arg(&src).into_owned(),
            "-all:all".to_string(),
            "-icc_profile".to_string(),
            "-use".to_string(),
            "MWG".to_string(),
            "-api".to_string(),
            "largefilesupport=1".to_string(),
            "-q".to_string(),
            "-m".to_string(),
            "-overwrite_original".to_string(),
            safe_path_arg(&dst).into_owned(),
        ],
        cancel,
        EXIFTOOL_TIMEOUT,
    );

    if let Err(e) = result {
        warn!(src = %src.display(), dst = %dst.display(), error = %e, "metadata preservation failed, continuing");
    }

    if let Err(e) = restore_timestamps(src, dst) {
        warn!(src = %src.display(), dst = %dst.display(), error = %e, "failed to restore timestamps");
    }
}

fn restore_timestamps(src: &Path, dst: &Path) -> std::io::Result<()> {
    let src_meta = std::fs::metadata(src)?;
    let mtime = FileTime::from_last_modification_time(&src_meta);
    let atime = FileTime::from_last_access_time(&src_meta);
    set_file_times(dst, atime, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn restore_timestamps_copies_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.jpg");
        let dst = dir.path().join("dst.avif");
        std::fs::write(&src, b"source").unwrap();
        std::fs::write(&dst, b"converted").unwrap();

        let old_time = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_times(&src, old_time, old_time).unwrap();

        restore_timestamps(&src, &dst).unwrap();

        let dst_meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dst_meta), old_time);
    }

    #[test]
    fn preserve_metadata_still_restores_timestamps_when_exiftool_missing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.jpg");
        let dst = dir.path().join("dst.avif");
        std::fs::write(&src, b"source").unwrap();
        std::fs::write(&dst, b"converted").unwrap();

        let old_time = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_times(&src, old_time, old_time).unwrap();

        let cancel = CancellationToken::new();
        preserve_metadata(&src, &dst, &cancel);

        let dst_meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&dst_meta), old_time);
    }
}
