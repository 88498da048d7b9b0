//! Settings of a `PubSub`
//!
//! `Options` deserializes with every field optional, so it can sit in an
//! application's own config file:
//!
//! ```toml
//! [exit]
//! exit_after_terminate = false
//! signals = ["SIGINT", "SIGTERM"]
//! ```

use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::signals::{signals_from_names, TERMINATING_SIGNALS};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Run the panic hook that was set before `start()` ahead of crash
    /// handlers (it prints the panic message)
    pub call_previous_panic_hook: bool,
    /// Exit once terminate handlers ran. When false, the program keeps
    /// running unless a handler calls `Context::exit`.
    pub exit_after_terminate: bool,
    /// Same as `exit_after_terminate`, for `quit()`
    pub exit_after_quit: bool,
    /// Names of the signals treated as termination
    pub signals: Vec<String>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            call_previous_panic_hook: true,
            exit_after_terminate: true,
            exit_after_quit: true,
            signals: TERMINATING_SIGNALS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn call_previous_panic_hook(mut self, value: bool) -> Options {
        self.call_previous_panic_hook = value;
        self
    }

    pub fn exit_after_terminate(mut self, value: bool) -> Options {
        self.exit_after_terminate = value;
        self
    }

    pub fn exit_after_quit(mut self, value: bool) -> Options {
        self.exit_after_quit = value;
        self
    }

    pub fn signals<I, S>(mut self, names: I) -> Options
        where I: IntoIterator<Item=S>,
              S: Into<String>,
    {
        self.signals = names.into_iter().map(Into::into).collect();
        self
    }

    /// Signals from `signals` available on this platform
    pub fn resolved_signals(&self) -> Vec<Signal> {
        signals_from_names(&self.signals)
    }
}
