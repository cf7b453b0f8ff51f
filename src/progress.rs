//! Recognition of downloader progress lines
//!
//! yt-dlp and youtube-dl report progress as lines such as
//! `[download]  42.5% of 10.00MiB at 1.2MiB/s ETA 00:07`. Any line with the
//! `[download]` marker, whitespace, a decimal percentage, `%`, whitespace and
//! `of` is a progress line; everything else is a plain message.

use crate::types::ProgressSample;
use regex::Regex;
use std::sync::LazyLock;

// The pattern is a literal; it cannot fail to compile.
#[allow(clippy::expect_used)]
static PROGRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%\s+of").expect("progress pattern is valid")
});

/// Classification of a single output line
#[derive(Clone, Debug, PartialEq)]
pub enum LineKind {
    /// Download progress line
    Progress(ProgressSample),
    /// Anything else
    Message,
}

/// Classify a line of downloader output
///
/// # Examples
///
/// ```
/// use ytdl_runner::progress::{classify_line, LineKind};
///
/// match classify_line("[download]  37.2% of 5.00MiB at 500KiB/s") {
///     LineKind::Progress(sample) => assert!((sample.percent - 37.2).abs() < 1e-4),
///     LineKind::Message => unreachable!(),
/// }
/// assert_eq!(classify_line("ERROR: unable to download video data"), LineKind::Message);
/// ```
pub fn classify_line(line: &str) -> LineKind {
    match parse_progress(line) {
        Some(percent) => LineKind::Progress(ProgressSample {
            percent,
            raw: line.to_string(),
        }),
        None => LineKind::Message,
    }
}

/// Extract the progress percentage from a line, clamped to 0..=100
pub fn parse_progress(line: &str) -> Option<f32> {
    let captures = PROGRESS_PATTERN.captures(line)?;
    let percent: f32 = captures.get(1)?.as_str().parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}
