//! Event sink that records everything it receives

use std::sync::{Arc, Mutex};
use std::time::Duration;
use ytdl_runner::{DownloadSession, EventSink, ProcessHandle, SessionOutcome};

/// One sink call, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Start,
    Message(String),
    ProgressValue(f32),
    ProgressString(String),
    Complete,
    Error,
    Termination,
}

/// Thread-safe sink storing every call; clones share the same log
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Recorded) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    pub fn starts(&self) -> usize {
        self.count(&Recorded::Start)
    }

    /// Texts passed to `on_message`, in order
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Message(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Recorded events without messages and progress
    pub fn lifecycle(&self) -> Vec<Recorded> {
        self.events()
            .into_iter()
            .filter(|e| {
                !matches!(
                    e,
                    Recorded::Message(_) | Recorded::ProgressValue(_) | Recorded::ProgressString(_)
                )
            })
            .collect()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_start(&self, _process: &ProcessHandle) {
        self.push(Recorded::Start);
    }

    fn on_message(&self, line: &str) {
        self.push(Recorded::Message(line.to_string()));
    }

    fn on_progress_value(&self, percent: f32) {
        self.push(Recorded::ProgressValue(percent));
    }

    fn on_progress_string(&self, raw: &str) {
        self.push(Recorded::ProgressString(raw.to_string()));
    }

    fn on_complete(&self) {
        self.push(Recorded::Complete);
    }

    fn on_error(&self) {
        self.push(Recorded::Error);
    }

    fn on_termination(&self) {
        self.push(Recorded::Termination);
    }
}

/// Maximum time any session in these tests may take
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for a session outcome, failing the test on timeout
pub async fn wait_outcome(session: &DownloadSession) -> SessionOutcome {
    tokio::time::timeout(SESSION_TIMEOUT, session.wait())
        .await
        .expect("session did not finish in time")
}

/// Poll until `condition` holds, failing the test on timeout
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(SESSION_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
