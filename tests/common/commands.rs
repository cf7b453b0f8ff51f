//! Shell commands standing in for a downloader

use std::path::Path;
use ytdl_runner::{CancellationPolicy, Command, Config, DownloadOrchestrator};

/// `sh -c <script>`
pub fn shell(script: &str) -> Command {
    Command::new("sh").arg("-c").arg(script)
}

/// Fails on the first run, succeeds on every later run
///
/// The first run leaves `marker` behind.
pub fn fail_once(marker: &Path) -> Command {
    let marker = marker.display();
    shell(&format!(
        "if [ -e '{marker}' ]; then echo recovered; exit 0; fi; touch '{marker}'; echo failing; exit 1"
    ))
}

/// Orchestrator with default settings
pub fn orchestrator() -> DownloadOrchestrator {
    DownloadOrchestrator::new(Config::default()).unwrap()
}

/// Orchestrator that fires `on_termination` after a cancel
pub fn notifying_orchestrator() -> DownloadOrchestrator {
    let mut config = Config::default();
    config.retry.cancellation = CancellationPolicy::NotifyTermination;
    DownloadOrchestrator::new(config).unwrap()
}
