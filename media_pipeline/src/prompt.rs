//! Low-Quality Batch Prompt (4.H): one interactive question, asked once per
//! run, governing every `ExtremeLow` task discovered.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, select};
use tracing::warn;

use crate::task::BatchDecision;

pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_LISTED: usize = 10;
pub const REPAIR_PERMITS: usize = 3;

/// Global console lock so progress output and this prompt never interleave.
/// Shared with any other component that writes to stderr/stdout during a run.
pub type ConsoleLock = Arc<Mutex<()>>;

/// Repair concurrency is independent of `concurrent_jobs`: a fixed
/// three-permit semaphore shared by every repair task, implemented as a
/// bounded channel pre-loaded with `REPAIR_PERMITS` tokens. `acquire` blocks
/// until a permit is available; dropping the returned guard releases it.
pub type RepairSemaphore = crossbeam_channel::Sender<()>;
pub type RepairPermitSource = crossbeam_channel::Receiver<()>;

pub fn new_repair_semaphore() -> (RepairSemaphore, RepairPermitSource) {
    let (tx, rx) = bounded(REPAIR_PERMITS);
    for _ in 0..REPAIR_PERMITS {
        let _ = tx.send(());
    }
    (tx, rx)
}

pub struct RepairPermit {
    release: RepairSemaphore,
}

impl Drop for RepairPermit {
    fn drop(&mut self) {
        let _ = self.release.send(());
    }
}

pub fn acquire_repair_permit(release: &RepairSemaphore, source: &RepairPermitSource) -> RepairPermit {
    let _ = source.recv();
    RepairPermit {
        release: release.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    SkipAll,
    RepairAll,
    DeleteAll,
}

impl PromptChoice {
    pub fn to_batch_decision(self) -> BatchDecision {
        match self {
            PromptChoice::SkipAll => BatchDecision::Skip,
            PromptChoice::RepairAll => BatchDecision::Repair,
            PromptChoice::DeleteAll => BatchDecision::Delete,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LowQualityFile {
    pub path: std::path::PathBuf,
    pub size_bytes: u64,
}

/// Renders the prompt, blocks for up to `PROMPT_TIMEOUT` on a response read
/// from a background thread, and returns `SkipAll` if nothing arrives in
/// time. `read_line` is injected so tests can supply canned input instead of
/// real stdin.
pub fn prompt_batch_decision(
    files: &[LowQualityFile],
    console: &ConsoleLock,
    read_line: impl FnOnce() -> std::io::Result<String> + Send + 'static,
) -> PromptChoice {
    let _guard = console.lock().unwrap_or_else(|p| p.into_inner());

    render(files);

    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(read_line());
    });

    select! {
        recv(rx) -> msg => parse_choice(msg.unwrap_or(Err(std::io::Error::other("channel closed")))),
        default(PROMPT_TIMEOUT) => {
            warn!("batch prompt timed out after {:?}, defaulting to skip all", PROMPT_TIMEOUT);
            PromptChoice::SkipAll
        }
    }
}

fn render(files: &[LowQualityFile]) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(
        stderr,
        "{} extremely low quality files detected.",
        files.len()
    );
    for f in files.iter().take(MAX_LISTED) {
        let _ = writeln!(stderr, "  {} ({} bytes)", f.path.display(), f.size_bytes);
    }
    let _ = writeln!(
        stderr,
        "[1] Skip all  [2] Repair all  [3] Delete all (default: Skip, {}s timeout)",
        PROMPT_TIMEOUT.as_secs()
    );
}

fn parse_choice(line: Result<String, std::io::Error>) -> PromptChoice {
    match line {
        Ok(s) => match s.trim() {
            "2" => PromptChoice::RepairAll,
            "3" => PromptChoice::DeleteAll,
            _ => PromptChoice::SkipAll,
        },
        Err(_) => PromptChoice::SkipAll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<LowQualityFile> {
        (0..n)
            .map(|i| LowQualityFile {
                path: format!("/a/f{i}.jpg").into(),
                size_bytes: 1024,
            })
            .collect()
    }

    #[test]
    fn timeout_defaults_to_skip() {
        let console = Arc::new(Mutex::new(()));
        let choice = prompt_batch_decision(&files(3), &console, || {
            std::thread::sleep(Duration::from_secs(10));
            Ok("2".to_string())
        });
        assert_eq!(choice, PromptChoice::SkipAll);
    }

    #[test]
    fn explicit_repair_choice_is_honored() {
        let console = Arc::new(Mutex::new(()));
        let choice = prompt_batch_decision(&files(1), &console, || Ok("2".to_string()));
        assert_eq!(choice, PromptChoice::RepairAll);
        assert_eq!(choice.to_batch_decision(), BatchDecision::Repair);
    }

    #[test]
    fn unrecognized_input_defaults_to_skip() {
        let console = Arc::new(Mutex::new(()));
        let choice = prompt_batch_decision(&files(1), &console, || Ok("garbage".to_string()));
        assert_eq!(choice, PromptChoice::SkipAll);
    }

    #[test]
    fn delete_choice_maps_to_delete_batch_decision() {
        assert_eq!(
            PromptChoice::DeleteAll.to_batch_decision(),
            BatchDecision::Delete
        );
    }

    #[test]
    fn repair_semaphore_caps_concurrency_at_three_permits() {
        let (release, permits) = new_repair_semaphore();
        let a = acquire_repair_permit(&release, &permits);
        let b = acquire_repair_permit(&release, &permits);
        let c = acquire_repair_permit(&release, &permits);
        assert!(permits.try_recv().is_err());
        drop(a);
        assert!(permits.try_recv().is_ok());
        drop(b);
        drop(c);
    }
}
