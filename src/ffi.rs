//! The C side: `atexit` and signal trampolines
//!
//! Neither `atexit` nor `sigaction` can carry a closure, so both hooks jump
//! through a process-wide slot holding the callback of the active
//! `ProcessHooks`. Signals are blocked while the slot is locked, so a
//! handler never waits for a lock its own thread holds.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use libc::c_int;
use nix::sys::signal::{raise, signal, SigHandler, SigSet, Signal};

use crate::error::{Error, Result};
use crate::hooks::{Disposition, HookCallback, HookEvent};
use crate::signals::SignalBlock;

static ACTIVE: Mutex<Option<HookCallback>> = Mutex::new(None);
static AT_EXIT_REGISTERED: AtomicBool = AtomicBool::new(false);

fn slot() -> MutexGuard<'static, Option<HookCallback>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Make `callback` receive exit and signal events, returning the one it
/// replaces
pub fn swap_active(callback: Option<HookCallback>) -> Option<HookCallback> {
    let _blocked = SignalBlock::block(&SigSet::all());
    let mut slot = slot();
    std::mem::replace(&mut *slot, callback)
}

/// Put `wrap(current)` into the slot, returning what was there
pub fn wrap_active<F>(wrap: F) -> Option<HookCallback>
    where F: FnOnce(Option<HookCallback>) -> HookCallback
{
    let _blocked = SignalBlock::block(&SigSet::all());
    let mut slot = slot();
    let previous = slot.take();
    *slot = Some(wrap(previous.clone()));
    previous
}

fn active() -> Option<HookCallback> {
    let _blocked = SignalBlock::block(&SigSet::all());
    let slot = slot();
    slot.clone()
}

/// Register `on_exit` with `atexit`. Once per process, since there is no
/// way to unregister it.
pub fn register_at_exit() -> Result<()> {
    if AT_EXIT_REGISTERED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    if unsafe { libc::atexit(on_exit) } != 0 {
        AT_EXIT_REGISTERED.store(false, Ordering::SeqCst);
        return Err(Error::AtExit);
    }
    Ok(())
}

extern "C" fn on_exit() {
    if let Some(callback) = active() {
        callback(HookEvent::Exit);
    }
}

/// Handler installed for terminating signals
///
/// With no active callback (hooks removed while the signal was in flight)
/// the default disposition is put back and the signal raised again.
pub extern "C" fn on_signal(sig: c_int) {
    let sig = match Signal::try_from(sig) {
        Ok(sig) => sig,
        Err(_) => return,
    };
    match active() {
        Some(callback) => {
            if let Disposition::Exit(code) = callback(HookEvent::Signal(sig)) {
                process::exit(code);
            }
        }
        None => unsafe {
            let _ = signal(sig, SigHandler::SigDfl);
            let _ = raise(sig);
        },
    }
}
