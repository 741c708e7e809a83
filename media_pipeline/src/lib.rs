//! Streaming batch media-conversion pipeline core.
//!
//! This crate is the engine only: process orchestration, quality
//! assessment, converter strategies, and the on-disk resume mechanism.
//! Command-line parsing, dependency-detection banners, and report
//! formatting live in the CLI binary crate.

pub mod aggregator;
pub mod backup;
pub mod cancel;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod probe;
pub mod prompt;
pub mod quality;
pub mod repair;
pub mod runner;
pub mod sentinel;
pub mod strategies;
pub mod task;
pub mod watchdog;

pub use aggregator::Counters;
pub use cancel::CancellationToken;
pub use capabilities::ToolCapabilities;
pub use config::{Config, ConfigBuilder, ConfigError, Mode};
pub use error::{PipelineError, Result};
pub use pipeline::{run, RunOutcome};
pub use task::{ConversionResult, Decision, FileTask, MediaKind, QualityLevel};
