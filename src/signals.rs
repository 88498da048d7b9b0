//! Terminating signals and a guard that owns their handlers
//!
//! The guard works as follows:
//!
//! 1. `SignalGuard::install()` replaces the handler of each signal with the
//!    given function, blocking the whole set while one of them is handled
//! 2. Previous handlers are kept and put back when the guard is dropped
//!
//! Only the dispositions are touched, the signal mask of the thread stays
//! as it was. `SignalBlock` is the other half: it masks signals out for the
//! current thread while some lock that handlers need is held.

use std::str::FromStr;

use libc::c_int;
use nix::sys::signal::{pthread_sigmask, sigaction, SaFlags, SigAction, SigHandler};
use nix::sys::signal::{SigSet, SigmaskHow, Signal};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Signals that ask a process to go away
///
/// `SIGBREAK` only exists on Windows and is skipped by `signals_from_names`
/// everywhere else.
pub const TERMINATING_SIGNALS: &[&str] = &["SIGINT", "SIGQUIT", "SIGTERM", "SIGBREAK"];

/// Resolve signal names, skipping the ones this platform doesn't have
///
/// ```
/// use nix::sys::signal::Signal;
///
/// let sigs = exit_hooks::signals_from_names(&["SIGABRT", "SIGBREAK", "SIGTERM"]);
/// assert_eq!(sigs, vec![Signal::SIGABRT, Signal::SIGTERM]);
/// ```
pub fn signals_from_names<I, S>(names: I) -> Vec<Signal>
    where I: IntoIterator<Item=S>,
          S: AsRef<str>,
{
    let mut result = Vec::new();
    for name in names {
        let name = name.as_ref();
        match Signal::from_str(name) {
            Ok(sig) => {
                if !result.contains(&sig) {
                    result.push(sig);
                }
            }
            Err(_) => debug!(signal = name, "signal is not available, skipping"),
        }
    }
    result
}

/// Exit code a shell reports for a process killed by `signal`
pub fn recommended_exit_code(signal: Signal) -> i32 {
    128 + signal as i32
}

/// A RAII guard for handlers of a set of signals
///
/// Old signal handlers are restored in `Drop` handler, in reverse order of
/// installation.
pub struct SignalGuard {
    oldsigs: Vec<(Signal, SigAction)>,
}

impl SignalGuard {
    /// Set `handler` for every signal in `signals`
    ///
    /// If any `sigaction` call fails, handlers that were already replaced
    /// are restored before the error is returned.
    pub fn install(signals: &[Signal], handler: extern "C" fn(c_int))
        -> Result<SignalGuard>
    {
        let action = SigAction::new(SigHandler::Handler(handler),
                                    SaFlags::empty(), sigset(signals));
        let mut guard = SignalGuard { oldsigs: Vec::new() };
        for &sig in signals {
            let old = unsafe { sigaction(sig, &action) }
                .map_err(|e| Error::Signal { signal: sig, source: e })?;
            guard.oldsigs.push((sig, old));
        }
        Ok(guard)
    }

    /// Signals this guard has a handler for
    pub fn signals(&self) -> Vec<Signal> {
        self.oldsigs.iter().map(|&(sig, _)| sig).collect()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for &(sig, ref sigact) in self.oldsigs.iter().rev() {
            if let Err(e) = unsafe { sigaction(sig, sigact) } {
                warn!(signal = %sig, error = %e, "cannot restore signal handler");
            }
        }
    }
}

/// Set of signals as a mask
pub fn sigset(signals: &[Signal]) -> SigSet {
    let mut sigset = SigSet::empty();
    for &sig in signals {
        sigset.add(sig);
    }
    sigset
}

/// A RAII guard keeping signals blocked on the current thread
///
/// Signals arriving meanwhile stay pending and are delivered when the guard
/// is dropped. Guards nest: each one puts back the mask it found.
pub struct SignalBlock {
    oldset: Option<SigSet>,
}

impl SignalBlock {
    pub fn block(sigset: &SigSet) -> SignalBlock {
        let mut oldset = SigSet::empty();
        match pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(sigset), Some(&mut oldset)) {
            Ok(()) => SignalBlock { oldset: Some(oldset) },
            Err(e) => {
                warn!(error = %e, "cannot block signals");
                SignalBlock { oldset: None }
            }
        }
    }
}

impl Drop for SignalBlock {
    fn drop(&mut self) {
        if let Some(ref oldset) = self.oldset {
            let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(oldset), None);
        }
    }
}
