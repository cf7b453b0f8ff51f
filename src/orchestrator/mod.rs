//! Download orchestration with bounded retry
//!
//! [`DownloadOrchestrator`] turns a downloader [`Command`] into a
//! [`DownloadSession`]. Each session runs on its own tokio task:
//!
//! 1. the process is launched and `on_start` fires
//! 2. every output line becomes either a progress event or a message, handed
//!    to the sink as it is read; a slow sink slows the downloader down
//! 3. on exit code 0 the session completes (`on_complete`, `on_termination`)
//! 4. on a non-zero exit the same command is relaunched immediately while the
//!    attempt number is at most `max_retries`
//! 5. once retries are exhausted the session fails (`on_error`, `on_termination`)
//!
//! A caller-initiated [`DownloadSession::destroy`] stops the loop. By default
//! cancellation is silent; see [`CancellationPolicy`].
//!
//! Attempts never overlap: the next process is started only after the previous
//! one has exited and its output has been fully delivered.

mod session;

pub use session::DownloadSession;

use crate::config::{CancellationPolicy, Config};
use crate::error::{Error, Result};
use crate::events::{EventSink, NoOpSink};
use crate::types::Command;
use encoding_rs::Encoding;
use session::{Launcher, SessionRunner, SinkSlot};
use std::sync::{Arc, Mutex, PoisonError};

/// Runs downloader commands and reports download-domain events
///
/// One orchestrator drives at most one live session at a time; starting a
/// new one while the previous is alive fails with [`Error::SessionActive`].
/// Use separate orchestrators for parallel downloads.
///
/// # Examples
///
/// ```no_run
/// use ytdl_runner::{CallbackSink, Command, Config, DownloadOrchestrator};
///
/// # #[tokio::main]
/// # async fn main() -> ytdl_runner::Result<()> {
/// let orchestrator = DownloadOrchestrator::new(Config::default())?.with_sink(
///     CallbackSink::new()
///         .with_progress_value(|percent| println!("{percent:.1}%"))
///         .with_error(|| eprintln!("download failed")),
/// );
///
/// let command = Command::new("yt-dlp")
///     .args(["-f", "best", "-o", "%(title)s.%(ext)s"])
///     .arg("https://example.com/watch?v=abc");
/// let session = orchestrator.execute(command)?;
/// let outcome = session.wait().await;
/// println!("finished after {} attempt(s)", outcome.attempts());
/// # Ok(())
/// # }
/// ```
pub struct DownloadOrchestrator {
    config: Config,
    encoding: &'static Encoding,
    sink: SinkSlot,
    session: Mutex<Option<DownloadSession>>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with a no-op event sink
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let encoding = config.process.resolve_encoding()?;
        Ok(Self {
            config,
            encoding,
            sink: SinkSlot::new(Arc::new(NoOpSink)),
            session: Mutex::new(None),
        })
    }

    /// Builder-style [`set_sink`](Self::set_sink)
    pub fn with_sink(self, sink: impl EventSink + 'static) -> Self {
        self.set_sink(Arc::new(sink));
        self
    }

    /// Replace the event sink
    ///
    /// Takes effect immediately, including for the events of a running session.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        self.sink.set(sink);
    }

    /// The configuration this orchestrator was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `command` with the configured `retry.max_retries`
    pub fn execute(&self, command: Command) -> Result<DownloadSession> {
        self.execute_with_retries(command, self.config.retry.max_retries)
    }

    /// Run `command`, relaunching it up to `max_retries` times after failures
    ///
    /// The first launch happens before this returns; if the executable cannot
    /// be started the error is returned here and no events fire. Everything
    /// after that is reported through the event sink from a background task.
    /// Must be called within a tokio runtime.
    pub fn execute_with_retries(
        &self,
        command: Command,
        max_retries: u32,
    ) -> Result<DownloadSession> {
        let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(DownloadSession::is_alive) {
            return Err(Error::SessionActive);
        }

        tracing::info!(command = %command, max_retries, "starting download");

        let launcher = Launcher {
            command,
            encoding: self.encoding,
            graceful_timeout: self.config.process.graceful_timeout,
            drain_timeout: self.config.process.drain_timeout,
            sink: self.sink.clone(),
        };
        let process = launcher.launch()?;

        let (runner, session) =
            SessionRunner::new(launcher, max_retries, self.cancellation(), &process);
        tokio::spawn(runner.run(process));

        *slot = Some(session.clone());
        Ok(session)
    }

    /// Whether the most recent session is still running
    pub fn is_alive(&self) -> bool {
        self.current_session()
            .is_some_and(|session| session.is_alive())
    }

    /// Cancel the most recent session, if any
    pub fn destroy(&self) {
        if let Some(session) = self.current_session() {
            session.destroy();
        }
    }

    /// The most recent session
    pub fn current_session(&self) -> Option<DownloadSession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cancellation(&self) -> CancellationPolicy {
        self.config.retry.cancellation
    }
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .field("encoding", &self.encoding.name())
            .field("session", &self.current_session())
            .finish()
    }
}
