//! Common test utilities for ytdl-runner integration tests

#[allow(dead_code)]
pub mod commands;
#[allow(dead_code)]
pub mod recording;

#[allow(unused_imports)]
pub use commands::*;
pub use recording::*;
