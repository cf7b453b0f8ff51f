//! Download event delivery
//!
//! A session reports through a single [`EventSink`], one method per event
//! kind. Every method has a no-op default, so a sink only implements what it
//! cares about and the orchestrator never checks for absent subscribers.
//!
//! Three sinks are provided:
//! - [`NoOpSink`] - discards everything (the orchestrator default)
//! - [`CallbackSink`] - per-event closures, last registration wins
//! - [`BroadcastSink`] - turns calls into [`DownloadEvent`] values on a
//!   broadcast channel for any number of subscribers
//!
//! Sink methods are invoked from the session's runtime tasks, one call at a
//! time and never from the caller of `execute`. Marshalling to a UI thread
//! is up to the sink.

use crate::process::ProcessHandle;
use crate::types::{DownloadEvent, ProgressSample};
use std::fmt;
use tokio::sync::broadcast;

/// Receiver of download session events
///
/// Ordering per session: `on_start` once per attempt; `on_message` or
/// `on_progress` for each output line; then
/// exactly one of `on_complete` or `on_error`, followed by `on_termination`.
/// A cancelled session fires none of the final three unless
/// [`CancellationPolicy::NotifyTermination`](crate::config::CancellationPolicy)
/// is configured, in which case only `on_termination` fires.
pub trait EventSink: Send + Sync {
    /// A downloader process was launched; `process` may be used to cancel it
    fn on_start(&self, _process: &ProcessHandle) {}

    /// An output line that is not a progress line
    fn on_message(&self, _line: &str) {}

    /// A progress line
    ///
    /// Defaults to `on_progress_value` followed by `on_progress_string`.
    /// Override it to receive both halves of the sample in one call.
    fn on_progress(&self, sample: &ProgressSample) {
        self.on_progress_value(sample.percent);
        self.on_progress_string(&sample.raw);
    }

    /// Progress percentage parsed from a progress line
    fn on_progress_value(&self, _percent: f32) {}

    /// The progress line as printed, fired right after `on_progress_value`
    fn on_progress_string(&self, _raw: &str) {}

    /// The download finished successfully
    fn on_complete(&self) {}

    /// The download failed and no retries remain
    fn on_error(&self) {}

    /// The session is over
    fn on_termination(&self) {}
}

/// Sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl EventSink for NoOpSink {}

type StartFn = Box<dyn Fn(&ProcessHandle) + Send + Sync>;
type TextFn = Box<dyn Fn(&str) + Send + Sync>;
type PercentFn = Box<dyn Fn(f32) + Send + Sync>;
type NotifyFn = Box<dyn Fn() + Send + Sync>;

/// Sink built from closures
///
/// Registering a closure for an event replaces any earlier one for the same
/// event. Events without a closure are ignored.
///
/// # Examples
///
/// ```
/// use ytdl_runner::events::CallbackSink;
///
/// let sink = CallbackSink::new()
///     .with_progress_value(|percent| println!("{percent:.1}%"))
///     .with_message(|line| println!("{line}"))
///     .with_complete(|| println!("done"));
/// ```
#[derive(Default)]
pub struct CallbackSink {
    start: Option<StartFn>,
    message: Option<TextFn>,
    progress_value: Option<PercentFn>,
    progress_string: Option<TextFn>,
    complete: Option<NotifyFn>,
    error: Option<NotifyFn>,
    termination: Option<NotifyFn>,
}

impl CallbackSink {
    /// Sink with no closures registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a process is launched
    pub fn with_start(mut self, f: impl Fn(&ProcessHandle) + Send + Sync + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    /// Called for each non-progress line
    pub fn with_message(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    /// Called with each parsed progress percentage
    pub fn with_progress_value(mut self, f: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.progress_value = Some(Box::new(f));
        self
    }

    /// Called with each raw progress line
    pub fn with_progress_string(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress_string = Some(Box::new(f));
        self
    }

    /// Called when the download succeeds
    pub fn with_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    /// Called when the download fails for good
    pub fn with_error(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Called when the session ends
    pub fn with_termination(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.termination = Some(Box::new(f));
        self
    }
}

impl EventSink for CallbackSink {
    fn on_start(&self, process: &ProcessHandle) {
        if let Some(f) = &self.start {
            f(process);
        }
    }

    fn on_message(&self, line: &str) {
        if let Some(f) = &self.message {
            f(line);
        }
    }

    fn on_progress_value(&self, percent: f32) {
        if let Some(f) = &self.progress_value {
            f(percent);
        }
    }

    fn on_progress_string(&self, raw: &str) {
        if let Some(f) = &self.progress_string {
            f(raw);
        }
    }

    fn on_complete(&self) {
        if let Some(f) = &self.complete {
            f();
        }
    }

    fn on_error(&self) {
        if let Some(f) = &self.error {
            f();
        }
    }

    fn on_termination(&self) {
        if let Some(f) = &self.termination {
            f();
        }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("start", &self.start.is_some())
            .field("message", &self.message.is_some())
            .field("progress_value", &self.progress_value.is_some())
            .field("progress_string", &self.progress_string.is_some())
            .field("complete", &self.complete.is_some())
            .field("error", &self.error.is_some())
            .field("termination", &self.termination.is_some())
            .finish()
    }
}

/// Sink that publishes [`DownloadEvent`]s on a broadcast channel
///
/// Slow subscribers lag rather than block the session; a lagging receiver
/// gets `RecvError::Lagged` and skips ahead. Events sent while nobody is
/// subscribed are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    event_tx: broadcast::Sender<DownloadEvent>,
}

impl BroadcastSink {
    /// Create a sink whose channel buffers up to `capacity` events
    ///
    /// A `capacity` of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _rx) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: DownloadEvent) {
        // No receivers is not an error
        self.event_tx.send(event).ok();
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn on_start(&self, process: &ProcessHandle) {
        self.emit(DownloadEvent::Started { pid: process.id() });
    }

    fn on_message(&self, line: &str) {
        self.emit(DownloadEvent::Message {
            line: line.to_string(),
        });
    }

    fn on_progress(&self, sample: &ProgressSample) {
        self.emit(DownloadEvent::Progress {
            percent: sample.percent,
            raw: sample.raw.clone(),
        });
    }

    fn on_progress_value(&self, _percent: f32) {
        // Only complete samples are published
    }

    fn on_progress_string(&self, raw: &str) {
        // Reached only when a caller forwards the split form by hand
        if let Some(percent) = crate::progress::parse_progress(raw) {
            self.on_progress(&ProgressSample {
                percent,
                raw: raw.to_string(),
            });
        }
    }

    fn on_complete(&self) {
        self.emit(DownloadEvent::Complete);
    }

    fn on_error(&self) {
        self.emit(DownloadEvent::Error);
    }

    fn on_termination(&self) {
        self.emit(DownloadEvent::Termination);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = NoOpSink;
        sink.on_message("hello");
        sink.on_progress_value(50.0);
        sink.on_progress_string("[download]  50.0% of 1MiB");
        sink.on_complete();
        sink.on_error();
        sink.on_termination();
    }

    #[test]
    fn callback_sink_routes_each_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let m = seen.clone();
        let p = seen.clone();
        let c = seen.clone();
        let t = seen.clone();
        let sink = CallbackSink::new()
            .with_message(move |line| s.lock().unwrap().push(format!("message:{line}")))
            .with_progress_value(move |v| m.lock().unwrap().push(format!("value:{v}")))
            .with_progress_string(move |raw| p.lock().unwrap().push(format!("raw:{raw}")))
            .with_complete(move || c.lock().unwrap().push("complete".to_string()))
            .with_termination(move || t.lock().unwrap().push("termination".to_string()));

        sink.on_message("info");
        sink.on_progress_value(12.5);
        sink.on_progress_string("[download]  12.5% of 3MiB");
        sink.on_error(); // not registered
        sink.on_complete();
        sink.on_termination();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                "message:info",
                "value:12.5",
                "raw:[download]  12.5% of 3MiB",
                "complete",
                "termination",
            ]
        );
    }

    #[test]
    fn callback_sink_last_registration_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        let second = seen.clone();

        let sink = CallbackSink::new()
            .with_error(move || first.lock().unwrap().push("first"))
            .with_error(move || second.lock().unwrap().push("second"));
        sink.on_error();

        assert_eq!(*seen.lock().unwrap(), ["second"]);
    }

    #[test]
    fn callback_sink_debug_lists_registered_events() {
        let sink = CallbackSink::new().with_complete(|| {});
        let debug = format!("{sink:?}");
        assert!(debug.contains("complete: true"));
        assert!(debug.contains("error: false"));
    }

    #[test]
    fn callback_sink_splits_a_progress_sample() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let v = seen.clone();
        let r = seen.clone();
        let sink = CallbackSink::new()
            .with_progress_value(move |percent| v.lock().unwrap().push(format!("value:{percent}")))
            .with_progress_string(move |raw| r.lock().unwrap().push(format!("raw:{raw}")));

        // Dispatched through the trait like the orchestrator does
        let dynamic: &dyn EventSink = &sink;
        dynamic.on_progress(&ProgressSample {
            percent: 42.0,
            raw: "[download]  42.0% of 2MiB".to_string(),
        });

        assert_eq!(
            *seen.lock().unwrap(),
            ["value:42", "raw:[download]  42.0% of 2MiB"]
        );
    }

    #[test]
    fn broadcast_sink_publishes_the_sample_it_was_given() {
        let sink = BroadcastSink::new(4);
        let mut rx = sink.subscribe();

        // The text and the value disagree; the value is not re-derived
        sink.on_progress(&ProgressSample {
            percent: 12.5,
            raw: "[download]  99.9% of 1MiB".to_string(),
        });

        assert_eq!(
            rx.try_recv().unwrap(),
            DownloadEvent::Progress {
                percent: 12.5,
                raw: "[download]  99.9% of 1MiB".to_string()
            }
        );
        assert!(rx.try_recv().is_err(), "one line, one event");
    }

    #[tokio::test]
    async fn broadcast_sink_publishes_events_in_order() {
        let sink = BroadcastSink::new(16);
        let mut rx = sink.subscribe();

        sink.on_message("[youtube] abc: Downloading webpage");
        sink.on_progress(&ProgressSample {
            percent: 37.2,
            raw: "[download]  37.2% of 10.00MiB".to_string(),
        });
        sink.on_complete();
        sink.on_termination();

        assert_eq!(
            rx.recv().await.unwrap(),
            DownloadEvent::Message {
                line: "[youtube] abc: Downloading webpage".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            DownloadEvent::Progress {
                percent: 37.2,
                raw: "[download]  37.2% of 10.00MiB".to_string()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), DownloadEvent::Complete);
        assert_eq!(rx.recv().await.unwrap(), DownloadEvent::Termination);
    }

    #[test]
    fn broadcast_sink_without_subscribers_does_not_fail() {
        let sink = BroadcastSink::new(0);
        sink.on_error();
        sink.on_termination();

        let mut rx = sink.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sinks_are_object_safe() {
        let sinks: Vec<Arc<dyn EventSink>> = vec![
            Arc::new(NoOpSink),
            Arc::new(CallbackSink::new()),
            Arc::new(BroadcastSink::default()),
        ];
        for sink in &sinks {
            sink.on_termination();
        }
    }
}
