//! Locating the downloader executable
//!
//! yt-dlp ships under several names (`yt-dlp`, the 32-bit `yt-dlp_x86` build)
//! and older setups still use `youtube-dl`. The configured candidates are
//! resolved in order with the `which` crate.

use crate::config::DownloaderConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolve the downloader executable to run
///
/// An explicit `executable` wins and is returned as configured. Otherwise the
/// first candidate that resolves is used: on `PATH` when `search_path` is
/// set, as a plain file path when it is not.
///
/// # Errors
///
/// [`Error::DownloaderNotFound`] listing every candidate tried.
///
/// # Examples
///
/// ```no_run
/// use ytdl_runner::config::DownloaderConfig;
/// use ytdl_runner::discovery::locate_downloader;
///
/// let path = locate_downloader(&DownloaderConfig::default())?;
/// println!("using {}", path.display());
/// # Ok::<(), ytdl_runner::Error>(())
/// ```
pub fn locate_downloader(config: &DownloaderConfig) -> Result<PathBuf> {
    if let Some(executable) = &config.executable {
        return Ok(executable.clone());
    }

    let found = config
        .candidates
        .iter()
        .find_map(|name| resolve(name, config.search_path));

    match found {
        Some(path) => {
            tracing::debug!(path = %path.display(), "downloader located");
            Ok(path)
        }
        None => Err(Error::DownloaderNotFound {
            candidates: config.candidates.clone(),
        }),
    }
}

/// Installed candidates other than the one that just failed
///
/// `failed` may be a candidate name or the path that was run. Useful for
/// offering another downloader after a session reported `on_error`.
pub fn alternate_downloaders(config: &DownloaderConfig, failed: &str) -> Vec<PathBuf> {
    let failed_path = Path::new(failed);
    let failed_resolved = resolve(failed, config.search_path);

    let mut alternates: Vec<PathBuf> = Vec::new();
    for name in &config.candidates {
        if name == failed {
            continue;
        }
        let Some(path) = resolve(name, config.search_path) else {
            continue;
        };
        if path == failed_path || Some(&path) == failed_resolved.as_ref() {
            continue;
        }
        if !alternates.contains(&path) {
            alternates.push(path);
        }
    }
    alternates
}

fn resolve(name: &str, search_path: bool) -> Option<PathBuf> {
    if search_path {
        which::which(name).ok()
    } else {
        let path = PathBuf::from(name);
        path.is_file().then_some(path)
    }
}
