//! One logical download: the retry loop and its caller-facing handle

use crate::config::CancellationPolicy;
use crate::error::LaunchError;
use crate::events::EventSink;
use crate::process::{ProcessHandle, ProcessSupervisor};
use crate::progress::{self, LineKind};
use crate::types::{Attempt, Command, SessionOutcome};
use encoding_rs::Encoding;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;

/// Replaceable event sink shared by an orchestrator and its sessions
///
/// Sessions look the sink up for every event, so replacing it takes effect
/// for the next event of a running session.
#[derive(Clone)]
pub(super) struct SinkSlot(Arc<RwLock<Arc<dyn EventSink>>>);

impl SinkSlot {
    pub(super) fn new(sink: Arc<dyn EventSink>) -> Self {
        Self(Arc::new(RwLock::new(sink)))
    }

    pub(super) fn get(&self) -> Arc<dyn EventSink> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(super) fn set(&self, sink: Arc<dyn EventSink>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

/// Everything needed to launch one attempt
pub(super) struct Launcher {
    pub(super) command: Command,
    pub(super) encoding: &'static Encoding,
    pub(super) graceful_timeout: Duration,
    pub(super) drain_timeout: Duration,
    pub(super) sink: SinkSlot,
}

impl Launcher {
    /// Spawn the downloader with `on_start` and its lines routed to the sink
    ///
    /// Both are dispatched from the supervision task, so every line of the
    /// attempt has reached the sink before the returned handle reports the exit.
    pub(super) fn launch(&self) -> Result<ProcessHandle, LaunchError> {
        let start_sink = self.sink.clone();
        let line_sink = self.sink.clone();
        ProcessSupervisor::new(self.command.clone())
            .encoding(self.encoding)
            .graceful_timeout(self.graceful_timeout)
            .drain_timeout(self.drain_timeout)
            .on_start(move |process| start_sink.get().on_start(process))
            .on_output_line(move |line| dispatch_line(&line_sink, &line.text))
            .start()
    }
}

fn dispatch_line(sink: &SinkSlot, line: &str) {
    let sink = sink.get();
    match progress::classify_line(line) {
        LineKind::Progress(sample) => sink.on_progress(&sample),
        LineKind::Message => sink.on_message(line),
    }
}

/// Session state visible through every [`DownloadSession`] clone
struct Shared {
    interrupted: AtomicBool,
    attempt: AtomicU32,
    current: Mutex<Option<ProcessHandle>>,
    outcome_rx: watch::Receiver<Option<SessionOutcome>>,
}

impl Shared {
    fn current(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running or finished download
///
/// Clones refer to the same session. Dropping every clone does not stop the
/// download; call [`destroy`](Self::destroy) for that.
#[derive(Clone)]
pub struct DownloadSession {
    shared: Arc<Shared>,
}

impl DownloadSession {
    /// True until the session has reached its final outcome
    pub fn is_alive(&self) -> bool {
        self.shared.outcome_rx.borrow().is_none()
    }

    /// Cancel the session
    ///
    /// The live attempt's process is asked to terminate and no further
    /// attempts are started. Returns without waiting for the process to exit.
    /// Calling it again, or after the session finished, does nothing.
    pub fn destroy(&self) {
        if self.shared.interrupted.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(process) = self.shared.current().as_ref() {
            if process.is_alive() {
                tracing::info!(pid = ?process.id(), "cancelling download");
            }
            process.destroy();
        }
    }

    /// Current attempt number, starting at 1
    pub fn attempt(&self) -> u32 {
        self.shared.attempt.load(Ordering::SeqCst)
    }

    /// Handle of the process for the current attempt
    pub fn process(&self) -> Option<ProcessHandle> {
        self.shared.current().clone()
    }

    /// Outcome if the session has finished
    pub fn outcome(&self) -> Option<SessionOutcome> {
        *self.shared.outcome_rx.borrow()
    }

    /// Wait for the session to finish
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.shared.outcome_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(SessionOutcome::Failed {
                attempts: self.attempt(),
                last_exit: None,
            }),
            // Session task dropped without an outcome (runtime shutdown)
            Err(_) => SessionOutcome::Failed {
                attempts: self.attempt(),
                last_exit: None,
            },
        }
    }
}

impl fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSession")
            .field("attempt", &self.attempt())
            .field("alive", &self.is_alive())
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Retry loop state owned by the session task
pub(super) struct SessionRunner {
    launcher: Launcher,
    max_retries: u32,
    cancellation: CancellationPolicy,
    shared: Arc<Shared>,
    outcome_tx: watch::Sender<Option<SessionOutcome>>,
}

impl SessionRunner {
    /// Create the runner and its caller-facing handle around a launched first attempt
    pub(super) fn new(
        launcher: Launcher,
        max_retries: u32,
        cancellation: CancellationPolicy,
        first: &ProcessHandle,
    ) -> (Self, DownloadSession) {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            interrupted: AtomicBool::new(false),
            attempt: AtomicU32::new(Attempt::first().get()),
            current: Mutex::new(Some(first.clone())),
            outcome_rx,
        });
        let session = DownloadSession {
            shared: shared.clone(),
        };
        let runner = Self {
            launcher,
            max_retries,
            cancellation,
            shared,
            outcome_tx,
        };
        (runner, session)
    }

    /// Drive attempts until success, exhaustion or cancellation
    pub(super) async fn run(self, mut process: ProcessHandle) {
        let mut attempt = Attempt::first();

        let outcome = loop {
            let exit = process.wait().await;

            if self.interrupted() {
                break self.cancelled(attempt.get());
            }

            if exit.success() {
                tracing::info!(
                    program = %self.launcher.command.program(),
                    attempts = attempt.get(),
                    "download completed"
                );
                let sink = self.launcher.sink.get();
                sink.on_complete();
                sink.on_termination();
                break SessionOutcome::Completed {
                    attempts: attempt.get(),
                };
            }

            if !attempt.can_retry(self.max_retries) {
                tracing::error!(
                    program = %self.launcher.command.program(),
                    attempts = attempt.get(),
                    code = ?exit.code,
                    "download failed after all retries"
                );
                self.fail();
                break SessionOutcome::Failed {
                    attempts: attempt.get(),
                    last_exit: Some(exit),
                };
            }

            tracing::warn!(
                attempt = attempt.get(),
                max_retries = self.max_retries,
                code = ?exit.code,
                "download attempt failed, retrying"
            );
            process.destroy();

            match self.relaunch() {
                Ok(Some(next)) => {
                    attempt = attempt.next();
                    self.shared.attempt.store(attempt.get(), Ordering::SeqCst);
                    process = next;
                }
                Ok(None) => break self.cancelled(attempt.get()),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        attempts = attempt.get(),
                        "could not relaunch downloader"
                    );
                    self.fail();
                    break SessionOutcome::Failed {
                        attempts: attempt.get(),
                        last_exit: None,
                    };
                }
            }
        };

        self.outcome_tx.send_replace(Some(outcome));
    }

    /// Start the next attempt unless the session was cancelled meanwhile
    ///
    /// Runs under the `current` lock so a concurrent `destroy` either sees the
    /// new process or prevents it from being started.
    fn relaunch(&self) -> Result<Option<ProcessHandle>, LaunchError> {
        let mut current = self.shared.current();
        if self.interrupted() {
            return Ok(None);
        }
        let process = self.launcher.launch()?;
        *current = Some(process.clone());
        Ok(Some(process))
    }

    fn interrupted(&self) -> bool {
        self.shared.interrupted.load(Ordering::SeqCst)
    }

    fn fail(&self) {
        let sink = self.launcher.sink.get();
        sink.on_error();
        sink.on_termination();
    }

    fn cancelled(&self, attempts: u32) -> SessionOutcome {
        tracing::info!(attempts, "download cancelled");
        if self.cancellation == CancellationPolicy::NotifyTermination {
            self.launcher.sink.get().on_termination();
        }
        SessionOutcome::Cancelled { attempts }
    }
}
