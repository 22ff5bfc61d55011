//! Cooperative cancellation shared between the job worker and the caller's
//! stop action.
//!
//! The token is a plain shared flag polled by every blocking loop in the
//! orchestrators. The controller additionally keeps non-owning references
//! (pids) to whatever download/transcode process is currently live, so a
//! stop request can follow up with a forced tree-kill instead of waiting
//! for the next poll point. Killing a process that already exited is fine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::platform;

/// Shared cancel flag for one job. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the cancel token for the current job and the kill handles of the
/// processes the job has in flight. The worker registers/clears pids as it
/// spawns and reaps children; the caller's stop action only reads them.
#[derive(Default)]
pub struct CancellationController {
    token: CancelToken,
    download_pid: Mutex<Option<u32>>,
    transcode_pid: Mutex<Option<u32>>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub(crate) fn set_download_pid(&self, pid: Option<u32>) {
        *self.download_pid.lock().unwrap_or_else(|e| e.into_inner()) = pid;
    }

    pub(crate) fn set_transcode_pid(&self, pid: Option<u32>) {
        *self.transcode_pid.lock().unwrap_or_else(|e| e.into_inner()) = pid;
    }

    /// Sets the cancel flag and tears down whatever is currently running.
    /// After this call no new child process will be spawned for the job.
    pub fn request_stop(&self) {
        self.token.cancel();
        let transcode = *self.transcode_pid.lock().unwrap_or_else(|e| e.into_inner());
        let download = *self.download_pid.lock().unwrap_or_else(|e| e.into_inner());
        for pid in [transcode, download].into_iter().flatten() {
            platform::kill_tree(pid);
        }
    }
}
