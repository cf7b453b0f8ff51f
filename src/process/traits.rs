//! Capability handle for a supervised process

use crate::types::ProcessExit;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Control surface of one running process
///
/// Implemented by the tokio-backed [`ProcessSupervisor`](super::ProcessSupervisor);
/// other backends (sandboxed execution, test doubles) can implement it to be
/// driven through the same [`ProcessHandle`].
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// OS process id, if the backend has one
    fn id(&self) -> Option<u32>;

    /// True from a successful start until the exit has been observed
    ///
    /// The exit is observed only after all output has been delivered.
    fn is_alive(&self) -> bool;

    /// Request termination
    ///
    /// Graceful first where the platform supports it, escalating to a forced
    /// kill. Must be a no-op once the process has exited, and must not block
    /// until the process is reaped.
    ///
    /// Returns once the request is recorded. The signal itself may be sent
    /// later by whoever owns the OS process, so `is_alive` can still report
    /// true right after this call; use [`wait`](Self::wait) to observe the exit.
    fn destroy(&self);

    /// Wait until the process has exited and its output has been drained
    async fn wait(&self) -> ProcessExit;
}

/// Clonable handle to a running downloader process
///
/// Handed to [`EventSink::on_start`](crate::events::EventSink::on_start) so a
/// caller can cancel the attempt without owning the OS process.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<dyn ProcessControl>,
}

impl ProcessHandle {
    /// Wrap a backend
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self { inner: control }
    }

    /// OS process id, if known
    pub fn id(&self) -> Option<u32> {
        self.inner.id()
    }

    /// See [`ProcessControl::is_alive`]
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// See [`ProcessControl::destroy`]
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// See [`ProcessControl::wait`]
    pub async fn wait(&self) -> ProcessExit {
        self.inner.wait().await
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}
