//! Configuration (4.K): per-run immutable parameters.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Quality,
    Efficiency,
    Auto,
}

/// The four quality-bucket thresholds driving the Quality Assessor (4.C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub extreme_high: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            extreme_high: 1.0,
            high: 1.0,
            medium: 1.0,
            low: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target_dir does not exist or is not readable: {0}")]
    InvalidTargetDir(PathBuf),

    #[error(
        "unsupported platform: this build only supports aarch64 macOS (got os={os}, arch={arch})"
    )]
    UnsupportedPlatform { os: &'static str, arch: &'static str },
}

/// Builder-populated, pre-validation configuration. `Config::validate` turns
/// this into the immutable `Config` the pipeline actually runs with.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    pub mode: Mode,
    pub target_dir: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub concurrent_jobs: Option<usize>,
    pub max_retries: u32,
    pub base_crf: f32,
    pub enable_backups: bool,
    pub hw_accel: bool,
    pub overwrite: bool,
    pub quality_thresholds: QualityThresholds,
    pub log_level: tracing::Level,
}

impl ConfigBuilder {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::Auto,
            target_dir: target_dir.into(),
            backup_dir: None,
            concurrent_jobs: None,
            max_retries: 3,
            base_crf: 28.0,
            enable_backups: true,
            hw_accel: false,
            overwrite: false,
            quality_thresholds: QualityThresholds::default(),
            log_level: tracing::Level::INFO,
        }
    }

    pub fn validate(self) -> Result<Config, ConfigError> {
        if !(cfg!(target_os = "macos") && cfg!(target_arch = "aarch64")) {
            return Err(ConfigError::UnsupportedPlatform {
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
            });
        }

        let target_dir = std::fs::canonicalize(&self.target_dir)
            .map_err(|_| ConfigError::InvalidTargetDir(self.target_dir.clone()))?;

        let backup_dir = self
            .backup_dir
            .unwrap_or_else(|| target_dir.join(".backups"));

        let default_jobs = default_concurrent_jobs();
        let concurrent_jobs = self.concurrent_jobs.unwrap_or(default_jobs).clamp(1, 7);

        Ok(Config {
            mode: self.mode,
            target_dir,
            backup_dir,
            concurrent_jobs,
            max_retries: self.max_retries,
            base_crf: self.base_crf.clamp(0.0, 51.0),
            enable_backups: self.enable_backups,
            hw_accel: self.hw_accel,
            overwrite: self.overwrite,
            quality_thresholds: self.quality_thresholds,
            log_level: self.log_level,
        })
    }
}

/// `concurrent_jobs` default: `max(1, 0.75 * CPU)`, capped at 7.
pub fn default_concurrent_jobs() -> usize {
    let cpu = num_cpus::get();
    (((cpu as f64) * 0.75).round() as usize).max(1).min(7)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub target_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub concurrent_jobs: usize,
    pub max_retries: u32,
    pub base_crf: f32,
    pub enable_backups: bool,
    pub hw_accel: bool,
    pub overwrite: bool,
    pub quality_thresholds: QualityThresholds,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn sentinel_dir(&self) -> PathBuf {
        self.target_dir.join(".media_conversion_results")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.target_dir.join(".logs")
    }

    pub fn is_excluded_dir(dir_name: &str) -> bool {
        matches!(
            dir_name,
            ".backups" | ".media_conversion_results" | ".logs"
        )
    }

    pub fn is_within_excluded_tree(path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(Self::is_excluded_dir)
                .unwrap_or(false)
        })
    }
}
