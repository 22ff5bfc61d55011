//! Child process supervision.
//!
//! Two modes cover everything the orchestrators need: [`run_captured`] for
//! short inspection calls with a hard deadline (URL classification, encoder
//! probes), and [`spawn_streaming`] for long-running downloads/encodes whose
//! combined stdout+stderr is consumed line by line.
//!
//! Output is decoded as UTF-8 with replacement characters; a malformed byte
//! sequence from the child never aborts monitoring.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

use crate::cancel::CancelToken;
use crate::error::{CoreError, CoreResult};
use crate::platform;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const LINE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Output of a captured (non-streaming) run.
#[derive(Debug)]
pub struct CapturedOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout and stderr joined, for tools that report on either stream.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs a command to completion, killing the whole process tree if it
/// outlives `timeout`.
pub fn run_captured<I, S>(program: &Path, args: I, timeout: Duration) -> CoreResult<CapturedOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = platform::hidden_command(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    debug!("running (captured): {:?}", cmd);

    let mut child = cmd
        .spawn()
        .map_err(|e| CoreError::CommandStart(program.display().to_string(), e))?;
    let pid = child.id();

    let stdout_reader = capture_pipe(child.stdout.take());
    let stderr_reader = capture_pipe(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                platform::kill_tree(pid);
                let _ = child.wait();
                return Err(CoreError::Timeout(timeout.as_secs()));
            }
            None => thread::sleep(WAIT_POLL_INTERVAL),
        }
    };

    Ok(CapturedOutput {
        code: status.code(),
        stdout: join_capture(stdout_reader),
        stderr: join_capture(stderr_reader),
    })
}

fn capture_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_capture(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// A live child whose combined output is streamed line by line.
///
/// The line stream is finite (ends when both pipes hit EOF) and not
/// restartable. [`RunningProcess::wait`] is safe to call after the stream
/// is exhausted.
pub struct RunningProcess {
    child: Child,
    pid: u32,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

/// Spawns a long-running command with stdout and stderr merged into one
/// lossy line stream.
pub fn spawn_streaming<I, S>(program: &Path, args: I) -> CoreResult<RunningProcess>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = platform::hidden_command(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    debug!("spawning (streaming): {:?}", cmd);

    let mut child = cmd
        .spawn()
        .map_err(|e| CoreError::CommandStart(program.display().to_string(), e))?;
    let pid = child.id();

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(stream_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(stream_lines(stderr, tx));
    }

    Ok(RunningProcess {
        child,
        pid,
        lines: rx,
        readers,
    })
}

fn stream_lines<R: Read + Send + 'static>(pipe: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

impl RunningProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Blocks for the next output line; `None` at end of stream.
    pub fn next_line(&mut self) -> Option<String> {
        self.lines.recv().ok()
    }

    /// Like [`next_line`](Self::next_line) but returns early (with `None`)
    /// once the token is cancelled, so a stop request is observed within
    /// one poll interval even from a silent child.
    pub fn next_line_cancellable(&mut self, token: &CancelToken) -> Option<String> {
        loop {
            if token.is_cancelled() {
                return None;
            }
            match self.lines.recv_timeout(LINE_POLL_INTERVAL) {
                Ok(line) => return Some(line),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Waits for the child to exit and returns its exit code (`None` when
    /// killed by a signal). Joins the reader threads first.
    pub fn wait(&mut self) -> CoreResult<Option<i32>> {
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        let status = self.child.wait()?;
        Ok(status.code())
    }

    /// Forcibly terminates the child and all of its descendants.
    pub fn kill_tree(&mut self) {
        platform::kill_tree(self.pid);
        let _ = self.child.kill();
    }
}
