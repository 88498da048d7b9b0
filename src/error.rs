//! Errors of hook installation

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors raised while installing or removing process hooks.
#[derive(Debug, Error)]
pub enum Error {
    /// `sigaction` refused to change the disposition of a signal.
    #[error("cannot set handler for {signal}: {source}")]
    Signal { signal: Signal, source: Errno },

    /// `atexit` has no room left for another function.
    #[error("cannot register the process exit hook")]
    AtExit,
}

pub type Result<T> = std::result::Result<T, Error>;
