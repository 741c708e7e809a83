//! Command-line front end: flag parsing, dependency-detection banner,
//! signal wiring, and end-of-run report formatting. None of this is part of
//! the pipeline core (`media_pipeline`); it only calls into it.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use media_pipeline::config::{ConfigBuilder, Mode as PipelineMode, QualityThresholds};
use media_pipeline::{pipeline, CancellationToken, ToolCapabilities};
use shared_utils::logging::{init_logging, LogConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Quality,
    Efficiency,
    Auto,
}

impl From<ModeArg> for PipelineMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Quality => PipelineMode::Quality,
            ModeArg::Efficiency => PipelineMode::Efficiency,
            ModeArg::Auto => PipelineMode::Auto,
        }
    }
}

/// Batch-rewrite images and video under a directory into JPEG XL, AVIF, and
/// HEVC/AV1-in-MOV, preserving metadata and timestamps.
#[derive(Debug, Parser)]
#[command(name = "media-format-boost", version)]
struct Cli {
    #[arg(long)]
    dir: std::path::PathBuf,

    #[arg(long, value_enum, default_value = "auto")]
    mode: ModeArg,

    #[arg(long)]
    jobs: Option<usize>,

    #[arg(long)]
    no_backup: bool,

    #[arg(long, default_value = "false")]
    hwaccel: bool,

    #[arg(long, default_value_t = 3)]
    retry: u32,

    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[arg(long, default_value_t = 28)]
    crf: u32,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let mut builder = ConfigBuilder::new(cli.dir.clone());
    builder.mode = cli.mode.into();
    builder.concurrent_jobs = cli.jobs;
    builder.enable_backups = !cli.no_backup;
    builder.hw_accel = cli.hwaccel;
    builder.max_retries = cli.retry;
    builder.overwrite = cli.overwrite;
    builder.base_crf = cli.crf as f32;
    builder.quality_thresholds = QualityThresholds::default();
    builder.log_level = log_level;

    let config = match builder.validate() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_config = LogConfig::new()
        .with_log_dir(config.log_dir())
        .with_level(config.log_level);
    let run_name = format!(
        "{:?}_run",
        config.mode
    )
    .to_lowercase();
    if let Err(e) = init_logging(&run_name, log_config) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    print_dependency_banner();

    let caps = Arc::new(ToolCapabilities::detect());
    tracing::info!(?caps, "tool capabilities detected");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }) {
            tracing::warn!(error = %e, "failed to install signal handler");
        }
    }

    let outcome = pipeline::run(config, caps, cancel);
    print_report(&outcome);

    ExitCode::SUCCESS
}

fn print_dependency_banner() {
    for tool in media_pipeline::capabilities::REQUIRED_TOOLS {
        let found = which::which(tool).is_ok();
        let marker = if found {
            console::style("ok").green()
        } else {
            console::style("MISSING").red().bold()
        };
        eprintln!("  [{marker}] {tool}");
    }
}

fn print_report(outcome: &pipeline::RunOutcome) {
    let c = &outcome.counters;
    eprintln!();
    eprintln!("{}", console::style("run summary").bold());
    eprintln!("  files found:      {}", c.files_found.load(Ordering::Relaxed));
    eprintln!("  files assessed:   {}", c.files_assessed.load(Ordering::Relaxed));
    eprintln!("  processed:        {}", c.processed.load(Ordering::Relaxed));
    eprintln!(
        "  success:          {}",
        console::style(c.success.load(Ordering::Relaxed)).green()
    );
    eprintln!(
        "  fail:             {}",
        console::style(c.fail.load(Ordering::Relaxed)).red()
    );
    eprintln!("  skip:             {}", c.skip.load(Ordering::Relaxed));
    eprintln!("  deleted:          {}", c.delete.load(Ordering::Relaxed));
    eprintln!("  resumed:          {}", c.resumed.load(Ordering::Relaxed));
    eprintln!("  retry successes:  {}", c.retry_success.load(Ordering::Relaxed));
    eprintln!("  smart decisions:  {}", c.smart_decisions.load(Ordering::Relaxed));
    eprintln!("  lossless wins:    {}", c.lossless_wins.load(Ordering::Relaxed));
    eprintln!(
        "  size decreased:   {} bytes",
        c.total_decreased.load(Ordering::Relaxed)
    );
    eprintln!(
        "  size increased:   {} bytes",
        c.total_increased.load(Ordering::Relaxed)
    );
}
