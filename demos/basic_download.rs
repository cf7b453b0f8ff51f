//! Basic download example
//!
//! This example demonstrates the core functionality of ytdl-runner:
//! - Locating the downloader executable
//! - Registering event callbacks
//! - Running a download with automatic retry
//! - Cancelling on Ctrl+C
//!
//! Usage: cargo run --example basic_download -- <url> [extra downloader args...]
//!
//! Set `RUST_LOG=ytdl_runner=debug` to see process lifecycle logs.

use std::io::Write;
use tracing_subscriber::EnvFilter;
use ytdl_runner::{
    CallbackSink, Command, Config, DownloadOrchestrator, SessionOutcome, cancel_on_signal,
    discovery,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytdl_runner=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: basic_download <url> [extra downloader args...]");
        std::process::exit(2);
    };

    let mut config = Config::default();
    config.retry.max_retries = 3;

    let downloader = discovery::locate_downloader(&config.downloader)?;
    println!("Using downloader: {}", downloader.display());

    let sink = CallbackSink::new()
        .with_start(|process| println!("▶ Started (pid {:?})", process.id()))
        .with_message(|line| println!("  {line}"))
        .with_progress_value(|percent| {
            print!("\r⬇ {percent:5.1}%");
            std::io::stdout().flush().ok();
        })
        .with_complete(|| println!("\n✓ Download complete"))
        .with_error(|| eprintln!("\n✗ Download failed"));

    let orchestrator = DownloadOrchestrator::new(config.clone())?.with_sink(sink);

    let command = Command::new(downloader.display().to_string())
        .args(["--newline", "--no-playlist"])
        .args(args)
        .arg(url);
    let session = orchestrator.execute(command)?;

    match cancel_on_signal(session).await {
        SessionOutcome::Completed { attempts } => {
            println!("Finished after {attempts} attempt(s)");
        }
        SessionOutcome::Failed { attempts, last_exit } => {
            eprintln!("Gave up after {attempts} attempt(s), last exit: {last_exit:?}");
            let failed = downloader.display().to_string();
            for alternate in discovery::alternate_downloaders(&config.downloader, &failed) {
                eprintln!("  try instead: {}", alternate.display());
            }
        }
        SessionOutcome::Cancelled { .. } => {
            println!("\nCancelled");
        }
    }

    Ok(())
}
