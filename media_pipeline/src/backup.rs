//! Backup creation (4.D, first half).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use sha1::{Digest, Sha1};
use tracing::error;

/// `<stem>_<YYYYMMDDhhmmss>_<sha1(src)[:8]>.bak<ext>` under `backup_dir`.
pub fn backup_path(src: &Path, backup_dir: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = src
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let timestamp = Local::now().format("%Y%m%d%H%M%S");
    let mut hasher = Sha1::new();
    hasher.update(src.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();
    let short_hash: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    backup_dir.join(format!("{stem}_{timestamp}_{short_hash}.bak{ext}"))
}

/// Creates `backup_dir` if needed and copies `src` into it. Aborts (returns
/// `false`) if the computed destination already exists, which should not
/// happen given the hash+timestamp naming. Copy failures are logged at
/// error and also return `false`.
pub fn create_backup(src: &Path, backup_dir: &Path) -> bool {
    if let Err(e) = fs::create_dir_all(backup_dir) {
        error!(path = %src.display(), error = %e, "failed to create backup directory");
        return false;
    }

    let dst = backup_path(src, backup_dir);
    if dst.exists() {
        error!(path = %dst.display(), "backup destination already exists, aborting");
        return false;
    }

    match fs::copy(src, &dst) {
        Ok(_) => true,
        Err(e) => {
            error!(path = %src.display(), dst = %dst.display(), error = %e, "backup copy failed");
            false
        }
    }
}
