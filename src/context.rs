//! What a handler learns about the exit in progress

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::fmt;
use std::panic::PanicHookInfo;

use nix::sys::signal::Signal;

/// The kind of exit that produced a `Context`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The process is exiting, no matter the reason
    Finish,
    /// A terminating signal arrived
    Terminate,
    /// A panic was not caught on the watched thread
    Crash,
    /// The program called `quit()`
    Quit,
}

/// A panic turned into plain data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crash {
    message: String,
    location: Option<String>,
    thread: Option<String>,
}

impl Crash {
    pub fn new<M: Into<String>>(message: M, location: Option<String>) -> Crash {
        Crash {
            message: message.into(),
            location: location,
            thread: None,
        }
    }

    pub(crate) fn from_panic(info: &PanicHookInfo<'_>) -> Crash {
        Crash {
            message: payload_message(info.payload()),
            location: info.location().map(|l| {
                format!("{}:{}:{}", l.file(), l.line(), l.column())
            }),
            thread: std::thread::current().name().map(|n| n.to_string()),
        }
    }

    /// Crash for an unwinding payload the panic hook never saw, as with
    /// `std::panic::resume_unwind`
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Crash {
        Crash {
            message: payload_message(payload),
            location: None,
            thread: std::thread::current().name().map(|n| n.to_string()),
        }
    }

    /// The panic message, or `Box<dyn Any>` for non-string payloads
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line:column` where the panic was raised
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

impl fmt::Display for Crash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.location {
            Some(ref loc) => write!(f, "panicked at {}: {}", loc, self.message),
            None => write!(f, "panicked: {}", self.message),
        }
    }
}

/// Read-only record passed to every handler of a single exit event
///
/// Handlers called for `finish` after a more specific event receive the
/// same context, so they can tell a clean exit from a signal or a crash.
///
/// The only thing a handler may change is the exit request, see
/// `Context::exit`.
pub struct Context {
    event: Event,
    signal: Option<Signal>,
    recommended_exit_code: Option<i32>,
    exception: Option<Crash>,
    traceback: Option<Backtrace>,
    exit_code: Option<i32>,
    exit_request: Cell<Option<i32>>,
}

impl Context {
    fn empty(event: Event) -> Context {
        Context {
            event: event,
            signal: None,
            recommended_exit_code: None,
            exception: None,
            traceback: None,
            exit_code: None,
            exit_request: Cell::new(None),
        }
    }

    /// Context of a clean exit
    pub fn finish() -> Context {
        Context::empty(Event::Finish)
    }

    pub fn terminate(signal: Signal) -> Context {
        Context {
            signal: Some(signal),
            recommended_exit_code: Some(crate::signals::recommended_exit_code(signal)),
            ..Context::empty(Event::Terminate)
        }
    }

    /// Backtraces that were not captured (`RUST_BACKTRACE` unset) are
    /// dropped, so `traceback()` is `Some` only when it has frames.
    pub fn crash(exception: Crash, traceback: Option<Backtrace>) -> Context {
        Context {
            exception: Some(exception),
            traceback: traceback
                .filter(|bt| bt.status() == BacktraceStatus::Captured),
            ..Context::empty(Event::Crash)
        }
    }

    pub fn quit(code: i32) -> Context {
        Context {
            exit_code: Some(code),
            recommended_exit_code: Some(code),
            ..Context::empty(Event::Quit)
        }
    }

    pub fn event(&self) -> Event {
        self.event
    }

    /// Signal that terminated the program
    pub fn signal(&self) -> Option<Signal> {
        self.signal
    }

    /// Polite exit code for this event: `128 + signal` or the quit code
    pub fn recommended_exit_code(&self) -> Option<i32> {
        self.recommended_exit_code
    }

    /// The panic that crashed the program
    pub fn exception(&self) -> Option<&Crash> {
        self.exception.as_ref()
    }

    pub fn traceback(&self) -> Option<&Backtrace> {
        self.traceback.as_ref()
    }

    /// Code passed to `quit()`
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Ask for the process to exit with `code` once this handler returns
    ///
    /// Remaining handlers of the current category are skipped, `finish`
    /// handlers still run. Only meaningful for `terminate` and `quit`
    /// handlers: a crash can't be prevented and a finish is already an exit.
    pub fn exit(&self, code: i32) {
        self.exit_request.set(Some(code));
    }

    pub fn exit_requested(&self) -> Option<i32> {
        self.exit_request.get()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("event", &self.event)
            .field("signal", &self.signal)
            .field("recommended_exit_code", &self.recommended_exit_code)
            .field("exception", &self.exception)
            .field("traceback", &self.traceback.is_some())
            .field("exit_code", &self.exit_code)
            .field("exit_request", &self.exit_request.get())
            .finish()
    }
}
