//! On-disk resume sentinels (4.F).
//!
//! One file per input, named by a stable hash of the absolute source path,
//! under `<target_dir>/.media_conversion_results/`. Content is
//! pipe-delimited `<decision>|<tag>|<original_size>|<new_size>`, no trailing
//! newline. A file is "done" iff its sentinel's decision is neither `FAIL_*`
//! nor `SKIP_*` (see `Decision::counts_as_done`, §9 ambiguity #1).

use std::fs;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::task::{ConversionResult, Decision};

pub fn sentinel_path(sentinel_dir: &Path, abs_source_path: &Path) -> PathBuf {
    let mut hasher = Sha1::new();
    hasher.update(abs_source_path.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();
    sentinel_dir.join(hex(&digest))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentinelRecord {
    pub decision: Decision,
    pub tag: String,
    pub original_size: u64,
    pub new_size: u64,
}

impl SentinelRecord {
    pub fn serialize(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.decision.as_str(),
            self.tag,
            self.original_size,
            self.new_size
        )
    }

    pub fn parse(content: &str) -> Option<Self> {
        let mut parts = content.splitn(4, '|');
        let decision = Decision::from_str(parts.next()?)?;
        let tag = parts.next()?.to_string();
        let original_size = parts.next()?.parse().ok()?;
        let new_size = parts.next()?.parse().ok()?;
        Some(Self {
            decision,
            tag,
            original_size,
            new_size,
        })
    }
}

impl From<&ConversionResult> for SentinelRecord {
    fn from(r: &ConversionResult) -> Self {
        Self {
            decision: r.decision,
            tag: r.tag.clone(),
            original_size: r.original_size,
            new_size: r.new_size,
        }
    }
}

/// Reads and parses the sentinel for `abs_source_path`, if any. Unparseable
/// content is treated as absent (per §9: "parsing must reject unknown
/// values") rather than panicking or propagating an error.
pub fn read_sentinel(sentinel_dir: &Path, abs_source_path: &Path) -> Option<SentinelRecord> {
    let path = sentinel_path(sentinel_dir, abs_source_path);
    let content = fs::read_to_string(path).ok()?;
    SentinelRecord::parse(&content)
}

pub fn is_done(sentinel_dir: &Path, abs_source_path: &Path) -> bool {
    read_sentinel(sentinel_dir, abs_source_path)
        .map(|r| r.decision.counts_as_done())
        .unwrap_or(false)
}

pub fn write_sentinel(
    sentinel_dir: &Path,
    abs_source_path: &Path,
    record: &SentinelRecord,
) -> std::io::Result<()> {
    fs::create_dir_all(sentinel_dir)?;
    let path = sentinel_path(sentinel_dir, abs_source_path);
    fs::write(path, record.serialize())
}
