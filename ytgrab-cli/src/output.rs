// ytgrab-cli/src/output.rs
//
// Console rendering of core events.
//
// Events are handed off to a dedicated printer thread over a bounded
// channel; the job worker never blocks on a slow terminal. When the
// channel is full the newest line is dropped.

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::warn;
use ytgrab_core::{Event, EventHandler, JobState};

const CHANNEL_CAPACITY: usize = 1024;

pub struct ConsoleHandler {
    tx: SyncSender<String>,
}

impl ConsoleHandler {
    /// Creates the handler and its printer thread. Join the returned handle
    /// after the last clone of the handler is dropped to flush output.
    pub fn spawn() -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let printer = thread::spawn(move || {
            for line in rx {
                println!("{line}");
            }
        });
        (Arc::new(Self { tx }), printer)
    }
}

impl EventHandler for ConsoleHandler {
    fn handle(&self, event: &Event) {
        let line = render_event(event);
        if let Err(TrySendError::Full(line)) = self.tx.try_send(line) {
            warn!("console output overflow, dropping: {line}");
        }
    }
}

fn render_event(event: &Event) -> String {
    match event {
        Event::Log { timestamp, message } => {
            format!("{} - {message}", timestamp.format("%Y-%m-%d %H:%M:%S"))
        }
        Event::StateChanged { state } => format!("==> {}", state_label(*state)),
        Event::UrlResolved { url, is_direct } => {
            if *is_direct {
                format!("resolved (direct): {url}")
            } else {
                format!("resolved: {url}")
            }
        }
        Event::FileReady { path } => format!("file ready: {}", path.display()),
    }
}

fn state_label(state: JobState) -> &'static str {
    match state {
        JobState::Idle => "idle",
        JobState::Resolving => "resolving",
        JobState::Downloading => "downloading",
        JobState::Transcoding => "transcoding",
        JobState::Completed => "completed",
        JobState::Failed => "failed",
        JobState::Cancelled => "cancelled",
    }
}
