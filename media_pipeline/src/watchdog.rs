//! Memory/Concurrency Watchdog (4.I): ticks every 30s, decrements
//! `concurrent_jobs` (never increases it) when resident memory is high.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cancel::CancellationToken;

pub const TICK_INTERVAL: Duration = Duration::from_secs(30);
pub const RSS_THRESHOLD_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Current process resident set size, in bytes. `None` if detection fails
/// or the platform isn't supported.
pub fn current_rss_bytes() -> Option<u64> {
    if cfg!(target_os = "linux") {
        rss_from_proc_self_status()
    } else if cfg!(target_os = "macos") {
        rss_from_ps()
    } else {
        None
    }
}

fn rss_from_proc_self_status() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().split_whitespace().next()?.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

fn rss_from_ps() -> Option<u64> {
    let pid = std::process::id().to_string();
    let output = std::process::Command::new("ps")
        .args(["-o", "rss=", "-p", &pid])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let kb: u64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    Some(kb * 1024)
}

/// One tick's worth of logic, separated from the timer loop so it's
/// directly testable. Returns `true` if it decremented.
pub fn tick(concurrent_jobs: &AtomicUsize, rss_bytes: Option<u64>) -> bool {
    let Some(rss) = rss_bytes else {
        return false;
    };
    if rss <= RSS_THRESHOLD_BYTES {
        return false;
    }

    let mut current = concurrent_jobs.load(Ordering::SeqCst);
    loop {
        if current <= 1 {
            return false;
        }
        let next = current - 1;
        match concurrent_jobs.compare_exchange(
            current,
            next,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                warn!(
                    rss_bytes = rss,
                    new_limit = next,
                    "memory watchdog reduced concurrent_jobs"
                );
                return true;
            }
            Err(observed) => current = observed,
        }
    }
}

/// Spawns the 30s watchdog timer thread. Returns its `JoinHandle`; the
/// thread exits once `cancel` trips. The 30s tick is accumulated in short
/// polls rather than one long sleep, so a cancellation mid-tick is noticed
/// within `POLL_INTERVAL` instead of blocking shutdown for up to 30s.
pub fn spawn(concurrent_jobs: Arc<AtomicUsize>, cancel: CancellationToken) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !cancel.is_cancelled() {
            if !wait_for_tick_or_cancel(&cancel) {
                break;
            }
            tick(&concurrent_jobs, current_rss_bytes());
        }
    })
}

/// Sleeps in `POLL_INTERVAL` increments until `TICK_INTERVAL` has elapsed.
/// Returns `false` (and stops early) if `cancel` trips in the meantime.
fn wait_for_tick_or_cancel(cancel: &CancellationToken) -> bool {
    let mut waited = Duration::ZERO;
    while waited < TICK_INTERVAL {
        if cancel.is_cancelled() {
            return false;
        }
        let remaining = TICK_INTERVAL - waited;
        std::thread::sleep(POLL_INTERVAL.min(remaining));
        waited += POLL_INTERVAL;
    }
    !cancel.is_cancelled()
}
