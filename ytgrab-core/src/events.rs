//! Job events and the dispatcher that fans them out to registered handlers.
//!
//! The core never renders anything itself; a presentation layer registers an
//! [`EventHandler`] and receives state transitions, resolved-URL updates and
//! timestamped log messages. Handlers are called synchronously on the job
//! worker thread and must not block; sinks that can fill up should buffer
//! internally (see the CLI's bounded console handler).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};

/// Lifecycle states of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Resolving,
    Downloading,
    Transcoding,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// The job moved to a new lifecycle state.
    StateChanged { state: JobState },

    /// A resolved or extracted URL is available for the current job.
    /// Emitted again if a later stage discovers a better (direct) link.
    UrlResolved { url: String, is_direct: bool },

    /// A file finished post-processing and is part of the job result.
    FileReady { path: PathBuf },

    /// Human-readable diagnostic for the log pane.
    Log {
        timestamp: DateTime<Local>,
        message: String,
    },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn emit(&self, event: Event) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }

    /// Emits a timestamped log message.
    pub fn log(&self, message: impl Into<String>) {
        self.emit(Event::Log {
            timestamp: Local::now(),
            message: message.into(),
        });
    }

    /// Emits a state transition.
    pub fn state(&self, state: JobState) {
        self.emit(Event::StateChanged { state });
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl EventHandler for Recorder {
        fn handle(&self, event: &Event) {
            if let Event::Log { message, .. } = event {
                self.0.lock().unwrap().push(message.clone());
            }
        }
    }

    #[test]
    fn log_reaches_all_handlers() {
        let first = Arc::new(Recorder(Mutex::new(Vec::new())));
        let second = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_handler(first.clone());
        dispatcher.add_handler(second.clone());

        dispatcher.log("hello");

        assert_eq!(first.0.lock().unwrap().as_slice(), ["hello"]);
        assert_eq!(second.0.lock().unwrap().as_slice(), ["hello"]);
    }
}
