//! tokio-backed process supervisor

use super::line_codec::LineCodec;
use super::traits::{ProcessControl, ProcessHandle};
use crate::config::ProcessConfig;
use crate::error::{LaunchError, Result};
use crate::types::{Command, OutputLine, ProcessExit, StreamKind};
use async_trait::async_trait;
use encoding_rs::Encoding;
use futures::StreamExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Lines buffered between the pipe readers and the line callback
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Consumer of output lines
pub type LineCallback = Box<dyn FnMut(OutputLine) + Send>;

/// Consumer of the process exit
pub type ExitCallback = Box<dyn FnOnce(ProcessExit) + Send>;

/// Observer of a freshly spawned process
pub type StartCallback = Box<dyn FnOnce(&ProcessHandle) + Send>;

/// Spawns one downloader process and streams its output
///
/// Standard output and standard error are read concurrently with the running
/// process, so a chatty child never blocks on a full pipe. Every line from
/// both pipes reaches the output callback exactly once, in order within each
/// pipe, before the exit callback fires. The start callback runs before the
/// first line.
///
/// On unix the child leads its own process group and termination signals go
/// to the whole group. Output still arriving from descendants after the child
/// has exited is waited for at most [`drain_timeout`](Self::drain_timeout).
///
/// # Examples
///
/// ```no_run
/// use ytdl_runner::{Command, ProcessSupervisor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handle = ProcessSupervisor::new(Command::new("yt-dlp").arg("--version"))
///     .on_output_line(|line| println!("{}", line.text))
///     .on_exit(|exit| println!("finished: {exit}"))
///     .start()?;
///
/// let exit = handle.wait().await;
/// assert!(exit.success());
/// # Ok(())
/// # }
/// ```
pub struct ProcessSupervisor {
    command: Command,
    encoding: &'static Encoding,
    graceful_timeout: Duration,
    drain_timeout: Duration,
    on_start: StartCallback,
    on_output: LineCallback,
    on_exit: ExitCallback,
}

impl ProcessSupervisor {
    /// Supervisor for `command` with UTF-8 decoding and no-op callbacks
    pub fn new(command: Command) -> Self {
        let defaults = ProcessConfig::default();
        Self {
            command,
            encoding: encoding_rs::UTF_8,
            graceful_timeout: defaults.graceful_timeout,
            drain_timeout: defaults.drain_timeout,
            on_start: Box::new(|_| {}),
            on_output: Box::new(|_| {}),
            on_exit: Box::new(|_| {}),
        }
    }

    /// Supervisor using the encoding and timeouts from `config`
    pub fn from_config(command: Command, config: &ProcessConfig) -> Result<Self> {
        Ok(Self::new(command)
            .encoding(config.resolve_encoding()?)
            .graceful_timeout(config.graceful_timeout)
            .drain_timeout(config.drain_timeout))
    }

    /// Text encoding of the process output
    ///
    /// Lines are split on ASCII `\n` and `\r` bytes, so only ASCII-compatible
    /// encodings are meaningful. UTF-16 variants decode as UTF-8, following
    /// the WHATWG output-encoding rule.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Grace period between the termination signal and the forced kill
    pub fn graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }

    /// How long to keep reading after exit while descendants hold the pipes open
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Register the start observer (replaces any previous one)
    ///
    /// Runs on the supervision task once, before any output line is delivered.
    pub fn on_start(mut self, callback: impl FnOnce(&ProcessHandle) + Send + 'static) -> Self {
        self.on_start = Box::new(callback);
        self
    }

    /// Register the line consumer (replaces any previous one)
    ///
    /// The pipe readers wait while the consumer is busy, so a slow consumer
    /// slows the child down instead of buffering its output.
    pub fn on_output_line(mut self, callback: impl FnMut(OutputLine) + Send + 'static) -> Self {
        self.on_output = Box::new(callback);
        self
    }

    /// Register the exit consumer (replaces any previous one)
    pub fn on_exit(mut self, callback: impl FnOnce(ProcessExit) + Send + 'static) -> Self {
        self.on_exit = Box::new(callback);
        self
    }

    /// Spawn the process and start draining its output
    ///
    /// Must be called from within a tokio runtime. Callbacks run on a runtime
    /// worker, not on the caller.
    pub fn start(self) -> std::result::Result<ProcessHandle, LaunchError> {
        let program = self.command.program().to_string();
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            LaunchError::NoRuntime {
                program: program.clone(),
            }
        })?;

        let mut command = tokio::process::Command::new(&program);
        command
            .args(self.command.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| LaunchError::from_io(program.clone(), e))?;

        let pid = child.id();
        tracing::debug!(program = %program, pid = ?pid, "downloader process spawned");

        let (exit_tx, exit_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = ProcessHandle::new(Arc::new(SupervisedProcess {
            pid,
            cancel: cancel.clone(),
            exit_rx,
        }));

        // Both pipes feed one channel; it closes once both readers hit EOF
        let (line_tx, lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(runtime.spawn(read_lines(
                stdout,
                StreamKind::Stdout,
                self.encoding,
                line_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(runtime.spawn(read_lines(
                stderr,
                StreamKind::Stderr,
                self.encoding,
                line_tx,
            )));
        }

        runtime.spawn(supervise(Supervision {
            child,
            lines,
            readers,
            handle: handle.clone(),
            on_start: self.on_start,
            on_output: self.on_output,
            on_exit: self.on_exit,
            cancel,
            graceful_timeout: self.graceful_timeout,
            drain_timeout: self.drain_timeout,
            exit_tx,
            program,
        }));

        Ok(handle)
    }
}

/// Handle-side state of a process owned by a supervision task
///
/// `destroy` only flags the request. The supervision task, which owns the
/// child and is the only one to reap it, delivers the signal on its next poll.
struct SupervisedProcess {
    pid: Option<u32>,
    cancel: CancellationToken,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

#[async_trait]
impl ProcessControl for SupervisedProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    fn destroy(&self) {
        if self.is_alive() && !self.cancel.is_cancelled() {
            tracing::debug!(pid = ?self.pid, "termination requested");
            self.cancel.cancel();
        }
    }

    async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or_else(ProcessExit::without_code),
            // Sender dropped without publishing: the supervision task was aborted
            Err(_) => ProcessExit::without_code(),
        }
    }
}

struct Supervision {
    child: Child,
    lines: mpsc::Receiver<OutputLine>,
    readers: Vec<JoinHandle<()>>,
    handle: ProcessHandle,
    on_start: StartCallback,
    on_output: LineCallback,
    on_exit: ExitCallback,
    cancel: CancellationToken,
    graceful_timeout: Duration,
    drain_timeout: Duration,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    program: String,
}

async fn supervise(supervision: Supervision) {
    let Supervision {
        mut child,
        mut lines,
        readers,
        handle,
        on_start,
        mut on_output,
        on_exit,
        cancel,
        graceful_timeout,
        drain_timeout,
        exit_tx,
        program,
    } = supervision;

    on_start(&handle);
    drop(handle);

    let (exit, drained) = {
        let drain = async {
            while let Some(line) = lines.recv().await {
                on_output(line);
            }
        };
        let wait = wait_for_exit(&mut child, &cancel, graceful_timeout, &program);
        tokio::pin!(drain, wait);

        let mut drained = false;
        let exit = loop {
            tokio::select! {
                () = &mut drain, if !drained => drained = true,
                exit = &mut wait => break exit,
            }
        };
        // Descendants of the child may still hold the pipes open
        let drained = drained || tokio::time::timeout(drain_timeout, &mut drain).await.is_ok();
        (exit, drained)
    };

    if !drained {
        tracing::warn!(
            program = %program,
            timeout_ms = u64::try_from(drain_timeout.as_millis()).unwrap_or(u64::MAX),
            "output pipes still open after exit, dropping the rest"
        );
        for reader in &readers {
            reader.abort();
        }
        lines.close();
        while let Ok(line) = lines.try_recv() {
            on_output(line);
        }
    }

    tracing::debug!(program = %program, code = ?exit.code, "downloader process exited");
    on_exit(exit);
    exit_tx.send_replace(Some(exit));
}

/// Wait for the child, honoring a termination request on the way
async fn wait_for_exit(
    child: &mut Child,
    cancel: &CancellationToken,
    graceful_timeout: Duration,
    program: &str,
) -> ProcessExit {
    tokio::select! {
        status = child.wait() => return collect(status, program),
        () = cancel.cancelled() => {}
    }

    if !request_graceful_exit(child) {
        return force_kill(child, program).await;
    }

    match tokio::time::timeout(graceful_timeout, child.wait()).await {
        Ok(status) => collect(status, program),
        Err(_) => {
            tracing::warn!(
                program = %program,
                timeout_secs = graceful_timeout.as_secs(),
                "process ignored termination request, killing"
            );
            force_kill(child, program).await
        }
    }
}

/// Signal the child's process group
///
/// Returns false if the signal could not be sent. A child that has already
/// been reaped counts as signalled.
#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> bool {
    // id() is None once the child has been reaped
    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return true;
    };
    // SAFETY: kill(2) has no memory-safety preconditions. The child was
    // spawned as a group leader and is not reaped yet, so its pid (and thus
    // the group id) cannot have been recycled.
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc != 0 {
        tracing::debug!(pid, signal, error = %std::io::Error::last_os_error(), "group signal failed");
        return false;
    }
    true
}

/// Send SIGTERM; returns false where graceful termination is unsupported
#[cfg(unix)]
fn request_graceful_exit(child: &Child) -> bool {
    signal_group(child, libc::SIGTERM)
}

#[cfg(not(unix))]
fn request_graceful_exit(_child: &Child) -> bool {
    false
}

async fn force_kill(child: &mut Child, program: &str) -> ProcessExit {
    #[cfg(unix)]
    signal_group(child, libc::SIGKILL);
    if let Err(e) = child.kill().await {
        tracing::debug!(program = %program, error = %e, "kill failed");
    }
    collect(child.wait().await, program)
}

fn collect(status: std::io::Result<std::process::ExitStatus>, program: &str) -> ProcessExit {
    match status {
        Ok(status) => ProcessExit::from(status),
        Err(e) => {
            tracing::warn!(program = %program, error = %e, "could not collect exit status");
            ProcessExit::without_code()
        }
    }
}

/// Decode one pipe into lines until EOF
///
/// Per-pipe order is preserved; interleaving between pipes follows arrival.
async fn read_lines<R>(
    reader: R,
    stream: StreamKind,
    encoding: &'static Encoding,
    tx: mpsc::Sender<OutputLine>,
) where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, LineCodec::new(encoding));
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(text) => {
                if tx.send(OutputLine { text, stream }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                // Closed or broken pipe: treat as end of data
                tracing::debug!(?stream, error = %e, "output stream ended with error");
                break;
            }
        }
    }
}
