//! Process exit notification library
//!
//! A process may end in several ways and each of them has its own hook:
//!
//! 1. Normal exit runs `atexit` functions
//! 2. Terminating signals (`SIGINT`, `SIGTERM`, ...) run signal handlers
//! 3. Panics run the panic hook, but whether a panic ends the program is
//!    only known once it unwinds out of `main`
//!
//! `PubSub` installs all three and lets you subscribe to them with one
//! kind of callback:
//!
//! ```no_run
//! let ps = exit_hooks::PubSub::new();
//!
//! ps.on_finish(|_| println!("When the program finishes, no matter the reason."));
//! ps.on_terminate(|ctx| println!("When the user terminates the program: {:?}",
//!                                ctx.signal()));
//! ps.on_crash(|ctx| println!("When there is an unhandled panic: {:?}",
//!                            ctx.exception()));
//!
//! ps.run(|| {
//!     // the program
//! }).unwrap();
//! ```
//!
//! `start()` alone gets finish and terminate events. Crashes are reported
//! by `run`, which sees the panics that nothing caught.
//!
//! `finish` handlers are called even if another handler has been called.
//! A handler registered for several events (pass the returned `Handler` to
//! `add_*_handler`) is called only once, on the earliest event.
//!
//! Deliberate exits are supported too, also only within `PubSub::run`, see
//! `quit()`.
//!
//! Be careful with the code you put in handlers: they may run inside a
//! signal handler or while the process is being torn down, and a panic
//! there aborts with little to no output. Test the function on its own,
//! then hook it up.
//!
//! The library tested only on linux
//!

mod context;
mod error;
mod ffi;
mod handler;
pub mod hooks;
mod options;
mod pubsub;
pub mod signals;

pub use context::{Context, Crash, Event};
pub use error::{Error, Result};
pub use handler::Handler;
pub use hooks::{Disposition, HookCallback, HookEvent, Hooks, ProcessHooks};
pub use options::Options;
pub use pubsub::{quit, PubSub, Quit};
pub use signals::{recommended_exit_code, signals_from_names, TERMINATING_SIGNALS};
