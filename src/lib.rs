//! # ytdl-runner
//!
//! Process supervision and progress parsing for yt-dlp style video
//! downloaders.
//!
//! ## Design Philosophy
//!
//! ytdl-runner is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers implement an [`EventSink`] or subscribe to a
//!   [`BroadcastSink`], no polling required
//! - **Sensible defaults** - Works with an empty configuration
//! - **Lossless** - Every output line is delivered before the exit is reported
//!
//! The crate does not build downloader argument lists. Callers pass the
//! ordered argument vector in a [`Command`]; ytdl-runner runs it, classifies
//! its output into progress and messages, and relaunches it on failure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ytdl_runner::{BroadcastSink, Command, Config, DownloadOrchestrator, discovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let downloader = discovery::locate_downloader(&config.downloader)?;
//!
//!     let sink = BroadcastSink::default();
//!     let mut events = sink.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let orchestrator = DownloadOrchestrator::new(config)?.with_sink(sink);
//!     let command = Command::new(downloader.display().to_string())
//!         .arg("https://example.com/watch?v=abc");
//!     let session = orchestrator.execute(command)?;
//!
//!     let outcome = ytdl_runner::cancel_on_signal(session).await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Downloader executable discovery
pub mod discovery;
/// Error types
pub mod error;
/// Event sinks
pub mod events;
/// Download orchestration and retry
pub mod orchestrator;
/// External process supervision
pub mod process;
/// Progress line recognition
pub mod progress;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{CancellationPolicy, Config, DownloaderConfig, ProcessConfig, RetryConfig};
pub use error::{Error, LaunchError, Result};
pub use events::{BroadcastSink, CallbackSink, EventSink, NoOpSink};
pub use orchestrator::{DownloadOrchestrator, DownloadSession};
pub use process::{ProcessControl, ProcessHandle, ProcessSupervisor};
pub use types::{
    Attempt, Command, DownloadEvent, OutputLine, ProcessExit, ProgressSample, SessionOutcome,
    StreamKind,
};

/// Wait for a session, cancelling it on a termination signal.
///
/// Returns the session's outcome. If a signal arrives first the session is
/// destroyed and the outcome is normally [`SessionOutcome::Cancelled`].
///
/// - **Unix:** listens for SIGTERM and SIGINT; if neither can be registered, falls back to Ctrl+C.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use ytdl_runner::{Command, Config, DownloadOrchestrator, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = DownloadOrchestrator::new(Config::default())?;
///     let session = orchestrator.execute(Command::new("yt-dlp").arg("https://example.com/v"))?;
///
///     // Ctrl+C stops the download instead of orphaning the process
///     let outcome = cancel_on_signal(session).await;
///     println!("{outcome:?}");
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(session: DownloadSession) -> SessionOutcome {
    tokio::select! {
        outcome = session.wait() => return outcome,
        () = wait_for_signal() => {}
    }
    session.destroy();
    session.wait().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use futures::future::{self, FutureExt};
    use tokio::signal::unix::{SignalKind, signal};

    let mut listeners = Vec::with_capacity(2);
    for (kind, name) in [
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::interrupt(), "SIGINT"),
    ] {
        // Registration can fail in sandboxes; the other signal may still work
        match signal(kind) {
            Ok(stream) => listeners.push((stream, name)),
            Err(e) => tracing::warn!(signal = name, error = %e, "could not listen for signal"),
        }
    }

    if listeners.is_empty() {
        tracing::error!("no signal listener registered, falling back to ctrl_c");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    let received = listeners.iter_mut().map(|(stream, name)| {
        async move {
            stream.recv().await;
            *name
        }
        .boxed()
    });
    let (name, _, _) = future::select_all(received).await;
    tracing::info!(signal = name, "signal received, cancelling download");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
