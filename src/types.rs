//! Core types for ytdl-runner

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Downloader command line: executable followed by its arguments
///
/// Built once and handed to a supervisor; it cannot be changed afterwards.
/// Argument semantics are not validated here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
}

impl Command {
    /// Start a command for the given executable
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build a command from an argument vector whose first element is the executable
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = argv.into_iter().map(Into::into);
        let program = parts
            .next()
            .filter(|p: &String| !p.trim().is_empty())
            .ok_or_else(|| Error::InvalidCommand("argument vector has no executable".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// The executable name or path
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the executable
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the executable
    pub fn to_argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Which pipe a line was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// One decoded line of process output, without its line terminator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    /// Decoded text
    pub text: String,
    /// Source pipe
    pub stream: StreamKind,
}

/// A recognized download progress line
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSample {
    /// Percentage in the range 0.0 to 100.0
    pub percent: f32,
    /// The line exactly as the downloader printed it
    pub raw: String,
}

/// How a supervised process ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code; `None` when the process was terminated by a signal
    /// or its status could not be collected
    pub code: Option<i32>,
}

impl ProcessExit {
    /// Exit with the given code
    pub fn with_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Exit without a code (signal or lost status)
    pub fn without_code() -> Self {
        Self { code: None }
    }

    /// Only code 0 counts as success
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated without exit code"),
        }
    }
}

/// One-based attempt counter for a download session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attempt(u32);

impl Attempt {
    /// The first attempt of a session
    pub fn first() -> Self {
        Self(1)
    }

    /// The attempt number, starting at 1
    pub fn get(&self) -> u32 {
        self.0
    }

    /// The attempt that follows this one
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether a failure on this attempt may still be retried
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.0 <= max_retries
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final state of a download session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The downloader exited with code 0
    Completed {
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed, or a retry could not be launched
    Failed {
        /// Attempts made
        attempts: u32,
        /// Exit of the last attempt; `None` if the last retry failed to launch
        last_exit: Option<ProcessExit>,
    },
    /// The caller destroyed the session
    Cancelled {
        /// Attempts made, including the cancelled one
        attempts: u32,
    },
}

impl SessionOutcome {
    /// Number of attempts the session made
    pub fn attempts(&self) -> u32 {
        match self {
            SessionOutcome::Completed { attempts }
            | SessionOutcome::Failed { attempts, .. }
            | SessionOutcome::Cancelled { attempts } => *attempts,
        }
    }

    /// True for [`SessionOutcome::Completed`]
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }
}

/// Event emitted during a download session
///
/// Produced by [`BroadcastSink`](crate::events::BroadcastSink) for consumers
/// that prefer a channel over implementing [`EventSink`](crate::events::EventSink).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A downloader process was launched
    Started {
        /// OS process id, if known
        pid: Option<u32>,
    },

    /// Output line that is not a progress line
    Message {
        /// The line text
        line: String,
    },

    /// Download progress update
    Progress {
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// The progress line as printed
        raw: String,
    },

    /// Final success
    Complete,

    /// Final failure after retries were exhausted
    Error,

    /// Session finished (after `Complete` or `Error`)
    Termination,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_argument_order() {
        let cmd = Command::new("yt-dlp")
            .arg("-f")
            .arg("best")
            .args(["--no-playlist", "https://example.com/watch?v=1"]);

        assert_eq!(cmd.program(), "yt-dlp");
        assert_eq!(
            cmd.arguments(),
            ["-f", "best", "--no-playlist", "https://example.com/watch?v=1"]
        );
        assert_eq!(cmd.to_argv().len(), 5);
        assert_eq!(
            cmd.to_string(),
            "yt-dlp -f best --no-playlist https://example.com/watch?v=1"
        );
    }

    #[test]
    fn from_argv_splits_program_and_args() {
        let cmd = Command::from_argv(["youtube-dl", "-o", "%(title)s.%(ext)s", "URL"]).unwrap();
        assert_eq!(cmd.program(), "youtube-dl");
        assert_eq!(cmd.arguments(), ["-o", "%(title)s.%(ext)s", "URL"]);
    }

    #[test]
    fn from_argv_rejects_empty_vector() {
        let result = Command::from_argv(Vec::<String>::new());
        assert!(matches!(result, Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn from_argv_rejects_blank_program() {
        assert!(Command::from_argv(["  ", "-v"]).is_err());
    }

    #[test]
    fn only_zero_exit_is_success() {
        assert!(ProcessExit::with_code(0).success());
        assert!(!ProcessExit::with_code(1).success());
        assert!(!ProcessExit::without_code().success());
        assert_eq!(ProcessExit::with_code(2).to_string(), "exit code 2");
    }

    #[test]
    fn attempt_retry_bound_matches_max_retries() {
        // max_retries = 2 permits attempts 1 and 2 to retry; attempt 3 is final
        let first = Attempt::first();
        assert_eq!(first.get(), 1);
        assert!(first.can_retry(2));
        assert!(first.next().can_retry(2));
        assert!(!first.next().next().can_retry(2));

        assert!(!Attempt::first().can_retry(0), "no retries when max is 0");
    }

    #[test]
    fn outcome_reports_attempts() {
        let outcome = SessionOutcome::Failed {
            attempts: 3,
            last_exit: Some(ProcessExit::with_code(1)),
        };
        assert_eq!(outcome.attempts(), 3);
        assert!(!outcome.is_success());
        assert!(SessionOutcome::Completed { attempts: 1 }.is_success());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(DownloadEvent::Progress {
            percent: 50.0,
            raw: "[download]  50.0% of 1.00MiB".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 50.0);

        let json = serde_json::to_value(DownloadEvent::Termination).unwrap();
        assert_eq!(json["type"], "termination");
    }
}
