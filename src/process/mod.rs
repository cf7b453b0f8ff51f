//! Supervision of one external downloader process
//!
//! [`ProcessSupervisor`] spawns the downloader with both output pipes
//! captured, decodes them into lines on dedicated tasks, and reports the exit
//! only after every line has been delivered. Callers interact with the running
//! process through a [`ProcessHandle`], a clonable capability backed by any
//! [`ProcessControl`] implementation.
//!
//! ## Termination
//!
//! [`ProcessHandle::destroy`] is cooperative first: on unix the child receives
//! `SIGTERM` and is killed if it is still running after the configured grace
//! period. Platforms without a graceful signal are killed immediately.

mod line_codec;
mod supervisor;
mod traits;

pub use supervisor::{ExitCallback, LineCallback, ProcessSupervisor};
pub use traits::{ProcessControl, ProcessHandle};
