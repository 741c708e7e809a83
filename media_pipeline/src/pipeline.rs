//! Pipeline Orchestrator (4.G): the four-stage streaming graph — discovery,
//! assessment, the batch-prompt barrier, conversion, and result
//! aggregation — wired together with bounded channels and one shared
//! cancellation token.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::Rng;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::aggregator::Counters;
use crate::cancel::CancellationToken;
use crate::capabilities::ToolCapabilities;
use crate::config::Config;
use crate::prompt::{self, LowQualityFile, RepairPermitSource, RepairSemaphore};
use crate::quality;
use crate::repair;
use crate::sentinel;
use crate::strategies;
use crate::task::{BatchDecision, ConversionResult, Decision, FileTask, MediaKind, QualityLevel};
use crate::{probe, watchdog};

const DISCOVERY_CHAN_CAP: usize = 2048;
const LOW_QUALITY_CHAN_CAP: usize = 1024;
const TASK_CHAN_CAP: usize = 4096;
const RESULT_CHAN_CAP: usize = 1024;
const MAX_PROMPTED: usize = 10_000;

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "heic", "heif", "tif", "tiff", "jxl", "mp4",
    "m4v", "mov", "mkv", "webm", "avi",
];

pub struct RunOutcome {
    pub counters: Arc<Counters>,
}

/// Runs one full pipeline pass over `config.target_dir`.
pub fn run(config: Arc<Config>, caps: Arc<ToolCapabilities>, cancel: CancellationToken) -> RunOutcome {
    let counters = Arc::new(Counters::new());
    let scratch_root = std::env::temp_dir().join(format!(
        "media_converter_{}",
        std::process::id()
    ));
    let _ = std::fs::create_dir_all(&scratch_root);

    let concurrent_jobs = Arc::new(AtomicUsize::new(config.concurrent_jobs));
    let watchdog_handle = watchdog::spawn(concurrent_jobs.clone(), cancel.clone());

    // The result channel and its single consumer are created before any
    // producer (assessment or conversion) starts, so a file that's skipped
    // during assessment (live photos, spatial media) can report its result
    // immediately instead of waiting for the conversion stage to exist.
    let (result_tx, result_rx) = bounded::<(ConversionResult, u32, crate::config::Mode)>(RESULT_CHAN_CAP);
    let aggregator_handle = {
        let counters = counters.clone();
        let config = config.clone();
        std::thread::spawn(move || {
            for (conversion_result, attempt, mode) in result_rx.iter() {
                let record = sentinel::SentinelRecord::from(&conversion_result);
                if let Err(e) =
                    sentinel::write_sentinel(&config.sentinel_dir(), &conversion_result.original_path, &record)
                {
                    warn!(path = %conversion_result.original_path.display(), error = %e, "failed to write sentinel");
                }
                counters.record_result(&conversion_result, attempt, mode);
            }
        })
    };

    let (discovery_tx, discovery_rx) = bounded::<PathBuf>(DISCOVERY_CHAN_CAP);
    let discovery_handle = {
        let config = config.clone();
        let cancel = cancel.clone();
        let counters = counters.clone();
        std::thread::spawn(move || discover(&config, &cancel, &counters, discovery_tx))
    };

    let (low_tx, low_rx) = bounded::<FileTask>(LOW_QUALITY_CHAN_CAP);
    let (task_tx, task_rx) = bounded::<FileTask>(TASK_CHAN_CAP);
    let assessment_workers = hardware_parallelism();
    let assessment_handles: Vec<_> = (0..assessment_workers)
        .map(|_| {
            let discovery_rx = discovery_rx.clone();
            let low_tx = low_tx.clone();
            let task_tx = task_tx.clone();
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();
            let counters = counters.clone();
            std::thread::spawn(move || {
                assess_worker(discovery_rx, low_tx, task_tx, &result_tx, &cancel, &counters)
            })
        })
        .collect();

    drop(low_tx);
    drop(task_tx);
    for h in assessment_handles {
        let _ = h.join();
    }
    let _ = discovery_handle.join();

    let low_quality_tasks: Vec<FileTask> = low_rx.try_iter().collect();
    let console = Arc::new(Mutex::new(()));
    let stamped = run_batch_prompt(low_quality_tasks, &console);

    let (reordered_tx, reordered_rx) = bounded::<FileTask>(TASK_CHAN_CAP);
    for task in task_rx.try_iter().chain(stamped.into_iter()) {
        let _ = reordered_tx.send(task);
    }
    drop(reordered_tx);
    let reorder_rx = reorder(reordered_rx);

    let (repair_sem, repair_permits) = prompt::new_repair_semaphore();
    let conversion_handles: Vec<_> = (0..config.concurrent_jobs.max(1))
        .map(|index| {
            let reorder_rx = reorder_rx.clone();
            let result_tx = result_tx.clone();
            let config = config.clone();
            let caps = caps.clone();
            let cancel = cancel.clone();
            let limit = concurrent_jobs.clone();
            let scratch_root = scratch_root.clone();
            let repair_sem = repair_sem.clone();
            let repair_permits = repair_permits.clone();
            std::thread::spawn(move || {
                conversion_worker(
                    index,
                    &reorder_rx,
                    &result_tx,
                    &config,
                    &caps,
                    &cancel,
                    &limit,
                    &scratch_root,
                    &repair_sem,
                    &repair_permits,
                )
            })
        })
        .collect();
    drop(result_tx);

    for h in conversion_handles {
        let _ = h.join();
    }
    let _ = aggregator_handle.join();

    cancel.cancel();
    let _ = watchdog_handle.join();
    let _ = std::fs::remove_dir_all(&scratch_root);

    RunOutcome { counters }
}

fn hardware_parallelism() -> usize {
    num_cpus::get().max(1)
}

fn discover(config: &Config, cancel: &CancellationToken, counters: &Counters, out: Sender<PathBuf>) {
    for entry in WalkDir::new(&config.target_dir)
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_str()
                .map(Config::is_excluded_dir)
                .unwrap_or(false)
        })
    {
        if cancel.is_cancelled() {
            return;
        }
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        counters.files_found.fetch_add(1, Ordering::Relaxed);

        // `filter_entry` above only excludes directories named for an
        // excluded subtree; a symlinked detour can still surface a file
        // under one, so check the full path too.
        if Config::is_within_excluded_tree(&path) {
            continue;
        }

        if !config.overwrite && sentinel::is_done(&config.sentinel_dir(), &path) {
            counters.record_resumed();
            continue;
        }

        if !has_supported_extension(&path) {
            continue;
        }

        if out.send(path).is_err() {
            return;
        }
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn assess_worker(
    discovery_rx: Receiver<PathBuf>,
    low_tx: Sender<FileTask>,
    task_tx: Sender<FileTask>,
    result_tx: &Sender<(ConversionResult, u32, crate::config::Mode)>,
    cancel: &CancellationToken,
    counters: &Counters,
) {
    for path in discovery_rx.iter() {
        if cancel.is_cancelled() {
            return;
        }
        if probe::is_live_photo(&path) || probe::is_live_photo_motion(&path) {
            emit_skip(&path, Decision::SkipUnsupported, result_tx, counters);
            continue;
        }

        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        let size_bytes = meta.len();
        let mime = probe::mime_type(&path, cancel);
        if mime == "unknown" {
            continue;
        }

        let media_kind = if mime.starts_with("video/") {
            MediaKind::Video
        } else if probe::is_animated(&path, &mime, cancel) {
            MediaKind::AnimatedImage
        } else {
            MediaKind::StaticImage
        };

        if probe::is_spatial(&path, cancel) {
            emit_skip(&path, Decision::SkipUnsupported, result_tx, counters);
            continue;
        }

        let quality = assess_quality(&path, &mime, media_kind, size_bytes, cancel);
        counters.files_assessed.fetch_add(1, Ordering::Relaxed);
        counters.record_quality_bucket(quality);

        let task = FileTask {
            path,
            size_bytes,
            mime_type: mime,
            media_kind,
            quality,
            batch_decision: BatchDecision::NotApplicable,
            temp_dir: None,
        };

        counters.total_to_process.fetch_add(1, Ordering::Relaxed);

        let sent = if task.priority() == 0 {
            low_tx.send(task)
        } else {
            task_tx.send(task)
        };
        if sent.is_err() {
            return;
        }
    }
}

/// Reports a file the assessor excludes before a `FileTask` is ever built
/// (live photos, their motion component, spatial/360 media): counted and
/// sentineled the same as a task that made it through conversion.
fn emit_skip(
    path: &Path,
    decision: Decision,
    result_tx: &Sender<(ConversionResult, u32, crate::config::Mode)>,
    counters: &Counters,
) {
    let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let result = ConversionResult {
        original_path: path.to_path_buf(),
        final_path: None,
        original_size: size_bytes,
        new_size: 0,
        tag: String::new(),
        decision,
        error: None,
    };
    counters.total_to_process.fetch_add(1, Ordering::Relaxed);
    let _ = result_tx.send((result, 0, crate::config::Mode::Auto));
}

fn assess_quality(
    path: &Path,
    mime: &str,
    media_kind: MediaKind,
    size_bytes: u64,
    cancel: &CancellationToken,
) -> QualityLevel {
    let thresholds = crate::config::QualityThresholds::default();
    match media_kind {
        MediaKind::Video => {
            let Some(info) = probe::video_stream_info(path, cancel) else {
                return QualityLevel::ExtremeLow;
            };
            let proxies = quality::probe_frame_proxies(path, cancel);
            quality::assess_video_quality(
                info.width,
                info.height,
                info.fps,
                info.bitrate,
                info.codec,
                proxies,
                size_bytes,
                &thresholds,
            )
        }
        MediaKind::StaticImage | MediaKind::AnimatedImage => {
            match quality::probe_image_metrics(path, mime, cancel) {
                Some(metrics) => quality::assess_image_quality(&metrics, size_bytes, &thresholds),
                None => QualityLevel::ExtremeLow,
            }
        }
    }
}

/// Runs the batch prompt (4.H) once over up to `MAX_PROMPTED` tasks and
/// stamps each with the resulting `batch_decision`. Tasks beyond the cap
/// keep `NotApplicable` and are treated as ordinary ExtremeLow tasks
/// (conversion still applies the Efficiency path to them).
fn run_batch_prompt(mut tasks: Vec<FileTask>, console: &prompt::ConsoleLock) -> Vec<FileTask> {
    if tasks.is_empty() {
        return tasks;
    }

    let prompted_count = tasks.len().min(MAX_PROMPTED);
    let files: Vec<LowQualityFile> = tasks[..prompted_count]
        .iter()
        .map(|t| LowQualityFile {
            path: t.path.clone(),
            size_bytes: t.size_bytes,
        })
        .collect();

    let choice = prompt::prompt_batch_decision(&files, console, read_stdin_line);
    let decision = choice.to_batch_decision();

    for task in tasks.iter_mut().take(prompted_count) {
        task.batch_decision = decision;
    }
    tasks
}

fn read_stdin_line() -> std::io::Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Reorder goroutine (4.G step 4): ExtremeLow tasks pass straight through;
/// everything else is buffered and only released once the input channel
/// closes, so user-flagged tasks are guaranteed to reach workers first.
fn reorder(input: Receiver<FileTask>) -> Receiver<FileTask> {
    let (tx, rx) = bounded::<FileTask>(TASK_CHAN_CAP);
    std::thread::spawn(move || {
        let mut buffered = Vec::new();
        for task in input.iter() {
            if task.is_extreme_low() {
                if tx.send(task).is_err() {
                    return;
                }
            } else {
                buffered.push(task);
            }
        }
        for task in buffered {
            if tx.send(task).is_err() {
                return;
            }
        }
    });
    rx
}

#[allow(clippy::too_many_arguments)]
fn conversion_worker(
    index: usize,
    reorder_rx: &Receiver<FileTask>,
    result_tx: &Sender<(ConversionResult, u32, crate::config::Mode)>,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
    limit: &AtomicUsize,
    scratch_root: &Path,
    repair_sem: &RepairSemaphore,
    repair_permits: &RepairPermitSource,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        if index >= limit.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }

        let task = match reorder_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(task) => task,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        };

        let mode = strategies::effective_mode(config.mode, task.quality);
        let (result, attempt) =
            process_one_task(task, config, caps, cancel, scratch_root, repair_sem, repair_permits);
        if result_tx.send((result, attempt, mode)).is_err() {
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_one_task(
    mut task: FileTask,
    config: &Config,
    caps: &ToolCapabilities,
    cancel: &CancellationToken,
    scratch_root: &Path,
    repair_sem: &RepairSemaphore,
    repair_permits: &RepairPermitSource,
) -> (ConversionResult, u32) {
    if task.batch_decision == BatchDecision::Delete {
        let _ = std::fs::remove_file(&task.path);
        return (
            ConversionResult {
                original_path: task.path.clone(),
                final_path: None,
                original_size: task.size_bytes,
                new_size: 0,
                tag: String::new(),
                decision: Decision::DeleteLowBatch,
                error: None,
            },
            0,
        );
    }
    if task.batch_decision == BatchDecision::Skip {
        return (
            ConversionResult {
                original_path: task.path.clone(),
                final_path: None,
                original_size: task.size_bytes,
                new_size: 0,
                tag: String::new(),
                decision: Decision::SkipLowBatch,
                error: None,
            },
            0,
        );
    }
    if task.batch_decision == BatchDecision::Repair {
        let _permit = prompt::acquire_repair_permit(repair_sem, repair_permits);
        if let Err(e) = repair::repair(&task.path, task.media_kind, task.size_bytes, cancel) {
            warn!(path = %task.path.display(), error = %e, "repair failed");
            return (
                ConversionResult {
                    original_path: task.path.clone(),
                    final_path: None,
                    original_size: task.size_bytes,
                    new_size: 0,
                    tag: String::new(),
                    decision: Decision::FailRepair,
                    error: Some(e.to_string()),
                },
                0,
            );
        }
    }

    let task_dir = scratch_root.join(format!("task_{:x}", task_hash(&task.path)));
    let _ = std::fs::create_dir_all(&task_dir);
    task.temp_dir = Some(task_dir.clone());

    let mut last_error = None;
    let mut final_attempt = 0;
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let jitter_ms: u64 = rand::thread_rng().gen_range(0..1000);
            std::thread::sleep(
                Duration::from_secs(1u64 << attempt.min(20)) + Duration::from_millis(jitter_ms),
            );
        }
        if cancel.is_cancelled() {
            last_error = Some(crate::error::PipelineError::Cancelled);
            final_attempt = attempt;
            break;
        }

        match strategies::run_strategy(&task, config, caps, cancel) {
            Ok(result) => {
                let _ = std::fs::remove_dir_all(&task_dir);
                return (result, attempt);
            }
            Err(e) => {
                final_attempt = attempt;
                if e.is_cancellation() {
                    last_error = Some(e);
                    break;
                }
                if e.category() == crate::error::ErrorCategory::Fatal
                    || e.category() == crate::error::ErrorCategory::Skip
                {
                    last_error = Some(e);
                    break;
                }
                warn!(path = %task.path.display(), attempt, error = %e, "conversion attempt failed, retrying");
                last_error = Some(e);
            }
        }
    }

    let _ = std::fs::remove_dir_all(&task_dir);
    let error = last_error.expect("loop always sets last_error before exiting without success");
    let decision = match error.decision_tag() {
        "FAIL_BACKUP" => Decision::FailBackup,
        "FAIL_RENAME" => Decision::FailRename,
        "SKIP_NO_OPTIMAL" => Decision::SkipNoOptimal,
        "SKIP_UNSUPPORTED" => Decision::SkipUnsupported,
        "FAIL_CANCELLED" => Decision::FailCancelled,
        "FAIL_IO" => Decision::FailIo,
        _ => Decision::FailRunner,
    };

    info!(path = %task.path.display(), decision = decision.as_str(), "task terminated without success");

    (
        ConversionResult {
            original_path: task.path.clone(),
            final_path: None,
            original_size: task.size_bytes,
            new_size: 0,
            tag: String::new(),
            decision,
            error: Some(error.to_string()),
        },
        final_attempt,
    )
}

fn task_hash(path: &Path) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extension_check() {
        assert!(has_supported_extension(Path::new("a.JPG")));
        assert!(has_supported_extension(Path::new("a.mov")));
        assert!(!has_supported_extension(Path::new("a.txt")));
        assert!(!has_supported_extension(Path::new("noext")));
    }

    #[test]
    fn reorder_places_extreme_low_before_others() {
        let (tx, rx) = bounded::<FileTask>(16);
        let high = FileTask {
            path: "/a".into(),
            size_bytes: 0,
            mime_type: String::new(),
            media_kind: MediaKind::StaticImage,
            quality: QualityLevel::High,
            batch_decision: BatchDecision::NotApplicable,
            temp_dir: None,
        };
        let mut low = high.clone();
        low.quality = QualityLevel::ExtremeLow;
        low.path = "/b".into();

        tx.send(high).unwrap();
        tx.send(low).unwrap();
        drop(tx);

        let out = reorder(rx);
        let first = out.recv().unwrap();
        assert!(first.is_extreme_low());
    }

    #[test]
    fn delete_batch_decision_short_circuits_conversion() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let mut task = FileTask {
            path: path.clone(),
            size_bytes: 1,
            mime_type: "image/jpeg".to_string(),
            media_kind: MediaKind::StaticImage,
            quality: QualityLevel::ExtremeLow,
            batch_decision: BatchDecision::Delete,
            temp_dir: None,
        };
        task.batch_decision = BatchDecision::Delete;

        let config = test_config(tmp.path());
        let caps = ToolCapabilities {
            has_jxl_encoder: false,
            has_av1_encoder: false,
            has_hw_videotoolbox: false,
        };
        let cancel = CancellationToken::new();
        let (repair_sem, repair_permits) = prompt::new_repair_semaphore();
        let (result, attempt) = process_one_task(
            task,
            &config,
            &caps,
            &cancel,
            tmp.path(),
            &repair_sem,
            &repair_permits,
        );
        assert_eq!(result.decision, Decision::DeleteLowBatch);
        assert_eq!(attempt, 0);
        assert!(!path.exists());
    }

    #[test]
    fn emit_skip_reports_a_counted_sentineled_result() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("IMG_1234.HEIC");
        std::fs::write(&path, b"live photo still").unwrap();

        let (result_tx, result_rx) = bounded::<(ConversionResult, u32, crate::config::Mode)>(4);
        let counters = Counters::new();
        emit_skip(&path, Decision::SkipUnsupported, &result_tx, &counters);
        drop(result_tx);

        let (result, attempt, _) = result_rx.recv().unwrap();
        assert_eq!(result.decision, Decision::SkipUnsupported);
        assert_eq!(result.original_path, path);
        assert_eq!(attempt, 0);
        assert_eq!(counters.total_to_process.load(Ordering::Relaxed), 1);
    }

    fn test_config(dir: &Path) -> Config {
        use crate::config::{Mode, QualityThresholds};
        Config {
            mode: Mode::Auto,
            target_dir: dir.to_path_buf(),
            backup_dir: dir.join(".backups"),
            concurrent_jobs: 1,
            max_retries: 0,
            base_crf: 28.0,
            enable_backups: true,
            hw_accel: false,
            overwrite: false,
            quality_thresholds: QualityThresholds::default(),
            log_level: tracing::Level::INFO,
        }
    }
}
