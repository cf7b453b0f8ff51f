//! Configuration types for ytdl-runner

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Downloader executable selection
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Path to the downloader executable (searched in `candidates` if None)
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Executable names tried in order when no explicit path is set
    /// (default: yt-dlp, yt-dlp_x86, youtube-dl)
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,

    /// Whether to search PATH for the candidates (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            executable: None,
            candidates: default_candidates(),
            search_path: true,
        }
    }
}

/// What a session reports after the caller cancels it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// No completion, error or termination event for a cancelled attempt (default)
    #[default]
    Silent,
    /// Fire `on_termination` once the cancelled process has exited
    NotifyTermination,
}

/// Retry policy for downloader processes that exit non-zero
///
/// Retries are immediate (no backoff): the downloader applies its own
/// network-level retries, this policy only restarts the whole process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of restarts after the first attempt (default: 10)
    ///
    /// `0` disables retrying; a session makes at most `max_retries + 1` attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Event behavior after a user-requested cancel
    #[serde(default)]
    pub cancellation: CancellationPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            cancellation: CancellationPolicy::default(),
        }
    }
}

/// Process supervision settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Text encoding label for process output (default: "utf-8")
    ///
    /// Any ASCII-compatible WHATWG label understood by `encoding_rs` is
    /// accepted, e.g. "windows-1251" or "cp866". UTF-16 labels are rejected
    /// because lines are split on single-byte terminators.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Time between the graceful termination signal and the forced kill (default: 5 seconds)
    #[serde(default = "default_graceful_timeout", with = "duration_serde")]
    pub graceful_timeout: Duration,

    /// How long output is still read after the process exited while
    /// descendants keep its pipes open (default: 2 seconds)
    #[serde(default = "default_drain_timeout", with = "duration_serde")]
    pub drain_timeout: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            graceful_timeout: default_graceful_timeout(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl ProcessConfig {
    /// Resolve the configured encoding label
    pub fn resolve_encoding(&self) -> Result<&'static Encoding> {
        let encoding = Encoding::for_label(self.encoding.trim().as_bytes()).ok_or_else(|| {
            Error::config(
                "process.encoding",
                format!("unknown text encoding label '{}'", self.encoding),
            )
        })?;
        if !encoding.is_ascii_compatible() {
            return Err(Error::config(
                "process.encoding",
                format!(
                    "text encoding '{}' is not ASCII-compatible and cannot be split into lines",
                    encoding.name()
                ),
            ));
        }
        Ok(encoding)
    }
}

/// Main configuration for [`DownloadOrchestrator`](crate::DownloadOrchestrator)
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which downloader executable to run
    #[serde(default)]
    pub downloader: DownloaderConfig,

    /// Process-level retry and cancellation policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output decoding and termination settings
    #[serde(default)]
    pub process: ProcessConfig,
}

impl Config {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_json_str(&contents)
    }

    /// Check settings that serde alone cannot reject
    pub fn validate(&self) -> Result<()> {
        self.process.resolve_encoding()?;

        if self.downloader.executable.is_none() && self.downloader.candidates.is_empty() {
            return Err(Error::config(
                "downloader.candidates",
                "at least one candidate is required when no executable is set",
            ));
        }

        if self
            .downloader
            .candidates
            .iter()
            .any(|name| name.trim().is_empty())
        {
            return Err(Error::config(
                "downloader.candidates",
                "candidate names must not be empty",
            ));
        }

        Ok(())
    }
}

fn default_candidates() -> Vec<String> {
    vec!["yt-dlp".into(), "yt-dlp_x86".into(), "youtube-dl".into()]
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_graceful_timeout() -> Duration {
    Duration::from_secs(5)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();

        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.cancellation, CancellationPolicy::Silent);
        assert_eq!(config.process.encoding, "utf-8");
        assert_eq!(config.process.graceful_timeout, Duration::from_secs(5));
        assert_eq!(config.process.drain_timeout, Duration::from_secs(2));
        assert_eq!(
            config.downloader.candidates,
            vec!["yt-dlp", "yt-dlp_x86", "youtube-dl"]
        );
        assert!(config.downloader.search_path);
        assert!(config.downloader.executable.is_none());
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{
            "retry": { "max_retries": 2, "cancellation": "notify_termination" },
            "process": { "graceful_timeout": 1 }
        }"#;
        let config = Config::from_json_str(json).unwrap();

        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(
            config.retry.cancellation,
            CancellationPolicy::NotifyTermination
        );
        assert_eq!(config.process.graceful_timeout, Duration::from_secs(1));
        assert_eq!(config.process.encoding, "utf-8", "untouched field keeps default");
    }

    #[test]
    fn graceful_timeout_serializes_as_whole_seconds() {
        let json = serde_json::to_value(ProcessConfig::default()).unwrap();
        assert_eq!(json["graceful_timeout"], 5);
    }

    #[test]
    fn unknown_encoding_label_is_a_config_error() {
        let json = r#"{ "process": { "encoding": "klingon-8" } }"#;
        match Config::from_json_str(json) {
            Err(Error::Config { key, message }) => {
                assert_eq!(key.as_deref(), Some("process.encoding"));
                assert!(message.contains("klingon-8"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn utf16_labels_are_rejected() {
        for label in ["utf-16le", "utf-16be", "utf-16"] {
            let process = ProcessConfig {
                encoding: label.into(),
                ..Default::default()
            };
            match process.resolve_encoding() {
                Err(Error::Config { key, message }) => {
                    assert_eq!(key.as_deref(), Some("process.encoding"));
                    assert!(message.contains("ASCII-compatible"), "{label}: {message}");
                }
                other => panic!("{label}: expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn legacy_codepage_labels_resolve() {
        let process = ProcessConfig {
            encoding: "windows-1251".into(),
            ..Default::default()
        };
        assert_eq!(
            process.resolve_encoding().unwrap(),
            encoding_rs::WINDOWS_1251
        );
    }

    #[test]
    fn empty_candidate_list_requires_explicit_executable() {
        let mut config = Config::default();
        config.downloader.candidates.clear();
        assert!(config.validate().is_err());

        config.downloader.executable = Some(PathBuf::from("/usr/local/bin/yt-dlp"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_candidate_is_rejected() {
        let mut config = Config::default();
        config.downloader.candidates.push("  ".into());
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn negative_timeout_is_a_serde_error() {
        let json = r#"{ "process": { "graceful_timeout": -1 } }"#;
        assert!(matches!(
            Config::from_json_str(json),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn load_reads_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ytdl-runner.json");
        std::fs::write(&path, r#"{ "retry": { "max_retries": 0 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
