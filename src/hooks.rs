//! Installing the native exit notification points
//!
//! `PubSub` never touches process-global state itself, it goes through the
//! `Hooks` trait. `ProcessHooks` is the real thing:
//!
//! * `atexit` for the normal exit
//! * `sigaction` for terminating signals
//! * `std::panic::set_hook` for panics on the thread that installed it
//!
//! Several `ProcessHooks` may be installed at once. Signals go to the last
//! one only, exit and panics go to all of them, most recent first.
//!
//! Handlers run inside those hooks, i.e. possibly inside a signal handler.
//! Nothing done there is async-signal-safe, and a panic in a handler aborts
//! the process.

use std::backtrace::Backtrace;
use std::panic::{self, PanicHookInfo};
use std::process;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use nix::sys::signal::Signal;
use tracing::debug;

use crate::context::Crash;
use crate::error::Result;
use crate::ffi;
use crate::signals::SignalGuard;

/// Something that happened to the process, as seen by a hook
#[derive(Debug)]
pub enum HookEvent {
    /// The process is exiting normally
    Exit,
    /// A terminating signal arrived
    Signal(Signal),
    /// A panic on the watched thread. The hook can't tell whether it will
    /// be caught, so this is a notice, not a crash yet.
    Panic {
        crash: Crash,
        backtrace: Option<Backtrace>,
    },
}

/// What the hook should do once subscribers ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to whatever the process was doing
    Continue,
    /// Exit the process with the code
    Exit(i32),
}

pub type HookCallback = Arc<dyn Fn(HookEvent) -> Disposition + Send + Sync>;

/// Installs and removes exit notification points
pub trait Hooks: Send {
    /// Route exit, `signals` and panics to `callback`
    fn install(&mut self, signals: &[Signal], callback: HookCallback)
        -> Result<()>;
    /// Put back whatever was there before `install`
    ///
    /// Hooks installed on top of each other must be uninstalled in reverse
    /// order, otherwise the later ones are dropped along with this one.
    fn uninstall(&mut self) -> Result<()>;
    /// Terminate the process. Real implementations never return.
    fn exit(&self, code: i32);
}

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

struct Installed {
    signals: SignalGuard,
    previous_callback: Option<HookCallback>,
    previous_panic_hook: Arc<PanicHook>,
}

/// Hooks of the current process
pub struct ProcessHooks {
    call_previous_panic_hook: bool,
    installed: Option<Installed>,
}

impl ProcessHooks {
    /// The panic hook that was set before `install` runs first unless
    /// `call_previous_panic_hook` is false. The default hook is the one
    /// printing "thread 'main' panicked at ...".
    pub fn new(call_previous_panic_hook: bool) -> ProcessHooks {
        ProcessHooks {
            call_previous_panic_hook: call_previous_panic_hook,
            installed: None,
        }
    }

    // Exit events also reach the callback installed before this one
    fn exit_chain(callback: HookCallback, previous: Option<HookCallback>)
        -> HookCallback
    {
        let previous = match previous {
            Some(previous) => previous,
            None => return callback,
        };
        Arc::new(move |event| match event {
            HookEvent::Exit => {
                callback(HookEvent::Exit);
                previous(HookEvent::Exit)
            }
            event => callback(event),
        })
    }

    fn panic_hook(callback: HookCallback, previous: Arc<PanicHook>,
                  call_previous: bool, watched: ThreadId)
        -> PanicHook
    {
        Box::new(move |info: &PanicHookInfo<'_>| {
            if call_previous {
                previous(info);
            }
            if thread::current().id() != watched {
                return;
            }
            callback(HookEvent::Panic {
                crash: Crash::from_panic(info),
                backtrace: Some(Backtrace::capture()),
            });
        })
    }
}

impl Default for ProcessHooks {
    fn default() -> ProcessHooks {
        ProcessHooks::new(true)
    }
}

impl Hooks for ProcessHooks {
    fn install(&mut self, signals: &[Signal], callback: HookCallback)
        -> Result<()>
    {
        if self.installed.is_some() {
            return Ok(());
        }
        ffi::register_at_exit()?;
        let previous_callback = ffi::wrap_active(|previous| {
            ProcessHooks::exit_chain(callback.clone(), previous)
        });
        let guard = match SignalGuard::install(signals, ffi::on_signal) {
            Ok(guard) => guard,
            Err(e) => {
                ffi::swap_active(previous_callback);
                return Err(e);
            }
        };
        let previous_panic_hook = Arc::new(panic::take_hook());
        panic::set_hook(ProcessHooks::panic_hook(
            callback,
            previous_panic_hook.clone(),
            self.call_previous_panic_hook,
            thread::current().id()));
        debug!(signals = ?guard.signals(), "process hooks installed");
        self.installed = Some(Installed {
            signals: guard,
            previous_callback: previous_callback,
            previous_panic_hook: previous_panic_hook,
        });
        Ok(())
    }

    fn uninstall(&mut self) -> Result<()> {
        let installed = match self.installed.take() {
            Some(installed) => installed,
            None => return Ok(()),
        };
        let previous = installed.previous_panic_hook;
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| previous(info)));
        drop(installed.signals);
        ffi::swap_active(installed.previous_callback);
        debug!("process hooks removed");
        Ok(())
    }

    fn exit(&self, code: i32) {
        process::exit(code);
    }
}
