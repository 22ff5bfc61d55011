//! Platform capabilities: hidden process spawning, process-tree teardown and
//! the null device, keeping the orchestration logic platform-agnostic.
//!
//! Child output decoding is not platform-dependent here: all pipes are read
//! as raw bytes and decoded as UTF-8 with replacement characters, so a
//! malformed byte sequence never aborts monitoring.

use std::path::Path;
use std::process::{Command, Stdio};

/// Builds a command that runs without an interactive stdin and, on Windows,
/// without flashing a console window. On Unix the child gets its own process
/// group so [`kill_tree`] covers its descendants.
pub fn hidden_command(program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Kills a process and its descendants, best effort. An already-exited pid
/// is not an error.
pub fn kill_tree(pid: u32) {
    #[cfg(windows)]
    {
        let _ = hidden_command(Path::new("taskkill"))
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .output();
    }

    #[cfg(unix)]
    {
        // The child was spawned as a process-group leader, so a negative pid
        // reaches the downloader's merge/post-process subprocesses too.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

/// Platform null device, used as the discard sink for encoder probes.
pub fn null_device() -> &'static str {
    if cfg!(windows) {
        "NUL"
    } else {
        "/dev/null"
    }
}
