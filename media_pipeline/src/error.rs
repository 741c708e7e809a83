//! Pipeline-wide error type.
//!
//! Leaf subsystems (runner, probe, strategies) raise small `thiserror`-derived
//! errors; this module collects them into one richer enum that call sites can
//! reason about by `category()` without matching every leaf variant.

use std::fmt;
use std::path::PathBuf;

use crate::runner::RunnerError;

/// How a `PipelineError` should be treated by the retry loop and the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Worth retrying with backoff (subprocess exit failure, short of cancellation).
    Transient,
    /// Task must report `FAIL_*` and never retry; source is untouched.
    Fatal,
    /// The run-scoped cancellation token tripped.
    Cancelled,
    /// Not a real failure: file should be counted `SKIP_*`.
    Skip,
}

#[derive(Debug)]
pub enum PipelineError {
    Runner {
        source: RunnerError,
        file_path: Option<PathBuf>,
    },
    BackupFailed {
        path: PathBuf,
        reason: String,
    },
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    NoOptimalCandidate {
        path: PathBuf,
    },
    UnsupportedMedia {
        path: PathBuf,
        reason: &'static str,
    },
    Cancelled,
    Io {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Runner { source, .. } if source.is_cancellation() => {
                ErrorCategory::Cancelled
            }
            PipelineError::Runner { .. } => ErrorCategory::Transient,
            PipelineError::BackupFailed { .. } | PipelineError::RenameFailed { .. } => {
                ErrorCategory::Fatal
            }
            PipelineError::NoOptimalCandidate { .. } | PipelineError::UnsupportedMedia { .. } => {
                ErrorCategory::Skip
            }
            PipelineError::Cancelled => ErrorCategory::Cancelled,
            PipelineError::Io { .. } => ErrorCategory::Transient,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.category() == ErrorCategory::Cancelled
    }

    /// The `FAIL_*` / `SKIP_*` decision tag this error resolves to, when it
    /// terminates a task outright (callers that retry never reach this).
    pub fn decision_tag(&self) -> &'static str {
        match self {
            PipelineError::BackupFailed { .. } => "FAIL_BACKUP",
            PipelineError::RenameFailed { .. } => "FAIL_RENAME",
            PipelineError::NoOptimalCandidate { .. } => "SKIP_NO_OPTIMAL",
            PipelineError::UnsupportedMedia { .. } => "SKIP_UNSUPPORTED",
            PipelineError::Cancelled => "FAIL_CANCELLED",
            PipelineError::Runner { .. } => "FAIL_RUNNER",
            PipelineError::Io { .. } => "FAIL_IO",
        }
    }

    pub fn with_file_path(self, path: PathBuf) -> Self {
        match self {
            PipelineError::Runner { source, .. } => PipelineError::Runner {
                source,
                file_path: Some(path),
            },
            PipelineError::Io { source, .. } => PipelineError::Io {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Runner { source, file_path } => {
                if let Some(p) = file_path {
                    write!(f, "runner error for {}: {}", p.display(), source)
                } else {
                    write!(f, "runner error: {}", source)
                }
            }
            PipelineError::BackupFailed { path, reason } => {
                write!(f, "backup failed for {}: {}", path.display(), reason)
            }
            PipelineError::RenameFailed { from, to, reason } => write!(
                f,
                "atomic rename {} -> {} failed: {}",
                from.display(),
                to.display(),
                reason
            ),
            PipelineError::NoOptimalCandidate { path } => {
                write!(f, "no candidate smaller than source for {}", path.display())
            }
            PipelineError::UnsupportedMedia { path, reason } => {
                write!(f, "unsupported media {}: {}", path.display(), reason)
            }
            PipelineError::Cancelled => write!(f, "run cancelled"),
            PipelineError::Io { path, source } => {
                if let Some(p) = path {
                    write!(f, "io error for {}: {}", p.display(), source)
                } else {
                    write!(f, "io error: {}", source)
                }
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Runner { source, .. } => Some(source),
            PipelineError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RunnerError> for PipelineError {
    fn from(source: RunnerError) -> Self {
        PipelineError::Runner {
            source,
            file_path: None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(source: std::io::Error) -> Self {
        PipelineError::Io { path: None, source }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
