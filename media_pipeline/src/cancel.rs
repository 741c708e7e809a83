//! Run-scoped cancellation token.
//!
//! One token is created per run and cloned into every stage, worker, and the
//! process runner. It is a thin `Arc<AtomicBool>` rather than anything richer —
//! the pipeline has exactly one cancellation source (SIGINT/SIGTERM or a fatal
//! stage error), so a single flag is sufficient and cheap to poll from hot
//! loops (channel recv, subprocess wait loop).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
