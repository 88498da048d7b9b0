//! The subscriber registry and its dispatch rules

use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::sys::signal::{SigSet, Signal};
use tracing::{debug, info};

use crate::context::{Context, Crash};
use crate::error::Result;
use crate::handler::{Handler, HandlerSet};
use crate::hooks::{Disposition, HookCallback, HookEvent, Hooks, ProcessHooks};
use crate::options::Options;
use crate::signals::{sigset, SignalBlock};

/// Payload of a deliberate exit, see `quit()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quit(pub i32);

/// Leave the program with `code` from anywhere inside `PubSub::run`
///
/// This unwinds the stack like a panic but does not invoke the panic hook,
/// so it is never reported as a crash. Outside of `run` the unwinding ends
/// the thread as an uncaught panic would.
pub fn quit(code: i32) -> ! {
    panic::resume_unwind(Box::new(Quit(code)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Finish,
    Terminate,
    Crash,
    Quit,
    Hold,
    Always,
}

#[derive(Default)]
struct State {
    finish: HandlerSet,
    terminate: HandlerSet,
    crash: HandlerSet,
    quit: HandlerSet,
    hold: HandlerSet,
    always: HandlerSet,
    called: HashSet<usize>,
    started: bool,
    // last panic seen by the hook, reported by `run` if it isn't caught
    pending_crash: Option<(Crash, Option<Backtrace>)>,
}

impl State {
    fn handlers(&mut self, kind: Kind) -> &mut HandlerSet {
        match kind {
            Kind::Finish => &mut self.finish,
            Kind::Terminate => &mut self.terminate,
            Kind::Crash => &mut self.crash,
            Kind::Quit => &mut self.quit,
            Kind::Hold => &mut self.hold,
            Kind::Always => &mut self.always,
        }
    }
}

struct Shared {
    options: Options,
    signals: Vec<Signal>,
    sigset: SigSet,
    state: Mutex<State>,
    hooks: Mutex<Box<dyn Hooks>>,
}

// Handlers run inside signal handlers and take the state lock, so the
// watched signals stay blocked for as long as the lock is held.
struct StateGuard<'a> {
    guard: MutexGuard<'a, State>,
    _blocked: SignalBlock,
}

impl<'a> Deref for StateGuard<'a> {
    type Target = State;
    fn deref(&self) -> &State {
        &self.guard
    }
}

impl<'a> DerefMut for StateGuard<'a> {
    fn deref_mut(&mut self) -> &mut State {
        &mut self.guard
    }
}

/// Publishes process exit events to subscribed handlers
///
/// ```no_run
/// let ps = exit_hooks::PubSub::new();
///
/// ps.on_finish(|_| println!("When the program finishes, no matter the reason."));
/// ps.on_terminate(|ctx| println!("Terminated by {:?}", ctx.signal()));
/// ps.on_crash(|ctx| println!("Crashed: {:?}", ctx.exception()));
///
/// // before any thread is spawned
/// ps.run(|| {
///     // the program
/// }).unwrap();
/// ```
///
/// Every handler runs at most once until `reset()`, even when registered
/// for several events. `finish` handlers run after any other event that
/// ends the process.
#[derive(Clone)]
pub struct PubSub {
    shared: Arc<Shared>,
}

impl PubSub {
    /// Registrar with default options, hooked into the current process
    pub fn new() -> PubSub {
        PubSub::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> PubSub {
        let hooks = ProcessHooks::new(options.call_previous_panic_hook);
        PubSub::with_hooks(options, hooks)
    }

    /// Registrar delivering events from custom `hooks`
    pub fn with_hooks<H: Hooks + 'static>(options: Options, hooks: H) -> PubSub {
        let signals = options.resolved_signals();
        PubSub {
            shared: Arc::new(Shared {
                sigset: sigset(&signals),
                signals: signals,
                options: options,
                state: Mutex::new(State::default()),
                hooks: Mutex::new(Box::new(hooks)),
            }),
        }
    }

    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    fn state(&self) -> StateGuard<'_> {
        let blocked = SignalBlock::block(&self.shared.sigset);
        StateGuard {
            guard: self.shared.state.lock().unwrap_or_else(PoisonError::into_inner),
            _blocked: blocked,
        }
    }

    fn hooks(&self) -> MutexGuard<'_, Box<dyn Hooks>> {
        self.shared.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called when the process exits, no matter the reason
    pub fn on_finish<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_finish_handler(handler.clone());
        handler
    }

    /// Called on a terminating signal (Ctrl+C, `kill`, ...)
    pub fn on_terminate<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_terminate_handler(handler.clone());
        handler
    }

    /// Called on a panic that unwinds out of `run()`
    ///
    /// The panic hook can't know whether a panic will be caught, so panics
    /// are only reported once they reach `run()`. Without `run()` a panic
    /// ending the program looks like a plain finish.
    pub fn on_crash<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_crash_handler(handler.clone());
        handler
    }

    /// Called on `quit()` inside `run()`
    pub fn on_quit<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_quit_handler(handler.clone());
        handler
    }

    /// Called when the program was about to exit but keeps running
    pub fn on_hold<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_hold_handler(handler.clone());
        handler
    }

    /// Called after any event, held or not
    pub fn always<F>(&self, func: F) -> Handler
        where F: Fn(&Context) + Send + Sync + 'static
    {
        let handler = Handler::new(func);
        self.add_always_handler(handler.clone());
        handler
    }

    pub fn add_finish_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Finish).insert(handler)
    }

    pub fn add_terminate_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Terminate).insert(handler)
    }

    pub fn add_crash_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Crash).insert(handler)
    }

    pub fn add_quit_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Quit).insert(handler)
    }

    pub fn add_hold_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Hold).insert(handler)
    }

    pub fn add_always_handler(&self, handler: Handler) -> bool {
        self.state().handlers(Kind::Always).insert(handler)
    }

    /// Has `start()` been called (and not undone by `stop()`)
    pub fn started(&self) -> bool {
        self.state().started
    }

    /// Install the hooks
    ///
    /// Call this before spawning threads or processes: signal dispositions
    /// are inherited and only panics of the calling thread are reported as
    /// crashes. Calling it again is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.started() {
            return Ok(());
        }
        self.reset();
        // the hooks keep the registrar alive until `stop()`
        let ps = self.clone();
        let callback: HookCallback = Arc::new(move |event| ps.dispatch(event));
        self.hooks().install(&self.shared.signals, callback)?;
        self.state().started = true;
        info!(signals = ?self.shared.signals, "watching process exit");
        Ok(())
    }

    /// Put back the hooks that were there before `start()`
    ///
    /// Registrars started on top of each other must be stopped in reverse
    /// order: stopping an outer one first also removes the hooks of the
    /// ones started after it, while they still report `started()`.
    pub fn stop(&self) -> Result<()> {
        if !self.started() {
            return Ok(());
        }
        self.hooks().uninstall()?;
        self.state().started = false;
        info!("stopped watching process exit");
        Ok(())
    }

    /// Forget which handlers already ran
    pub fn reset(&self) {
        let mut state = self.state();
        state.called.clear();
        state.pending_crash = None;
    }

    /// Start, then run `main`, reacting to `quit()`
    ///
    /// Returns `Some` with the value of `main` when it returns. On `quit()`
    /// the quit handlers run, then the process exits, unless
    /// `exit_after_quit` is off and no handler asked to exit, in which case
    /// `None` is returned. A panic unwinding out of `main` runs the crash
    /// handlers, then `finish`, then keeps unwinding.
    pub fn run<F, T>(&self, main: F) -> Result<Option<T>>
        where F: FnOnce() -> T
    {
        self.start()?;
        let payload = match panic::catch_unwind(AssertUnwindSafe(main)) {
            Ok(value) => return Ok(Some(value)),
            Err(payload) => payload,
        };
        match payload.downcast::<Quit>() {
            Ok(quit) => {
                if let Disposition::Exit(code) = self.handle_quit(quit.0) {
                    self.hooks().exit(code);
                }
                Ok(None)
            }
            Err(payload) => {
                let pending = self.state().pending_crash.take();
                let (crash, backtrace) = pending.unwrap_or_else(|| {
                    (Crash::from_payload(&*payload), None)
                });
                self.handle_crash(crash, backtrace);
                panic::resume_unwind(payload)
            }
        }
    }

    fn dispatch(&self, event: HookEvent) -> Disposition {
        match event {
            HookEvent::Exit => self.handle_exit(),
            HookEvent::Signal(sig) => self.handle_terminate(sig),
            HookEvent::Panic { crash, backtrace } => {
                self.state().pending_crash = Some((crash, backtrace));
                Disposition::Continue
            }
        }
    }

    // Runs handlers that didn't run yet. Terminate and quit handlers stop
    // as soon as one of them requests exit.
    fn call_handlers(&self, kind: Kind, ctx: &Context) {
        let interruptible = kind == Kind::Terminate || kind == Kind::Quit;
        let handlers = self.state().handlers(kind).snapshot();
        for handler in handlers {
            if interruptible && ctx.exit_requested().is_some() {
                break;
            }
            if !self.state().called.insert(handler.id()) {
                continue;
            }
            handler.call(ctx);
        }
    }

    fn handle_finish(&self, ctx: &Context) {
        self.call_handlers(Kind::Finish, ctx);
        self.call_handlers(Kind::Always, ctx);
    }

    fn handle_hold(&self, ctx: &Context) {
        self.call_handlers(Kind::Hold, ctx);
        self.call_handlers(Kind::Always, ctx);
        self.reset();
    }

    fn handle_exit(&self) -> Disposition {
        debug!("process exit");
        self.handle_finish(&Context::finish());
        Disposition::Continue
    }

    fn handle_crash(&self, crash: Crash, backtrace: Option<Backtrace>) {
        debug!(%crash, "unhandled panic");
        let ctx = Context::crash(crash, backtrace);
        self.call_handlers(Kind::Crash, &ctx);
        self.handle_finish(&ctx);
    }

    fn handle_terminate(&self, signal: Signal) -> Disposition {
        let ctx = Context::terminate(signal);
        self.call_handlers(Kind::Terminate, &ctx);
        let recommended = crate::signals::recommended_exit_code(signal);
        self.conclude(&ctx, self.shared.options.exit_after_terminate, recommended)
    }

    fn handle_quit(&self, code: i32) -> Disposition {
        debug!(code, "quit requested");
        let ctx = Context::quit(code);
        self.call_handlers(Kind::Quit, &ctx);
        self.conclude(&ctx, self.shared.options.exit_after_quit, code)
    }

    // Exit or hold after terminate or quit handlers ran
    fn conclude(&self, ctx: &Context, exit_by_default: bool, code: i32)
        -> Disposition
    {
        match ctx.exit_requested() {
            Some(requested) => {
                self.handle_finish(ctx);
                Disposition::Exit(requested)
            }
            None if exit_by_default => {
                self.handle_finish(ctx);
                Disposition::Exit(code)
            }
            None => {
                self.handle_hold(ctx);
                Disposition::Continue
            }
        }
    }
}

impl Default for PubSub {
    fn default() -> PubSub {
        PubSub::new()
    }
}

impl fmt::Debug for PubSub {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PubSub")
            .field("options", &self.shared.options)
            .field("started", &self.started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::{Arc, Mutex};

    use nix::sys::signal::{raise, Signal};
    use serial_test::serial;

    use crate::context::{Context, Crash};
    use crate::error::Result;
    use crate::hooks::{Disposition, HookCallback, HookEvent, Hooks};
    use crate::options::Options;
    use super::{quit, PubSub};

    #[derive(Clone, Default)]
    struct FakeHooks {
        callback: Arc<Mutex<Option<HookCallback>>>,
        signals: Arc<Mutex<Vec<Signal>>>,
        exits: Arc<Mutex<Vec<i32>>>,
        installs: Arc<Mutex<usize>>,
    }

    impl Hooks for FakeHooks {
        fn install(&mut self, signals: &[Signal], callback: HookCallback)
            -> Result<()>
        {
            *self.signals.lock().unwrap() = signals.to_vec();
            *self.callback.lock().unwrap() = Some(callback);
            *self.installs.lock().unwrap() += 1;
            Ok(())
        }
        fn uninstall(&mut self) -> Result<()> {
            *self.callback.lock().unwrap() = None;
            Ok(())
        }
        fn exit(&self, code: i32) {
            self.exits.lock().unwrap().push(code);
        }
    }

    impl FakeHooks {
        fn fire(&self, event: HookEvent) -> Disposition {
            let callback = self.callback.lock().unwrap().clone()
                .expect("hooks are not installed");
            callback(event)
        }
        fn installed(&self) -> bool {
            self.callback.lock().unwrap().is_some()
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, name: &'static str)
        -> impl Fn(&Context) + Send + Sync + 'static
    {
        let log = log.clone();
        move |ctx: &Context| {
            log.lock().unwrap().push(format!("{}:{:?}", name, ctx.event()));
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn started(options: Options) -> (PubSub, FakeHooks, Log) {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(options, hooks.clone());
        ps.start().unwrap();
        (ps, hooks, Log::default())
    }

    fn crash_event() -> HookEvent {
        HookEvent::Panic {
            crash: Crash::new("boom", Some("src/main.rs:1:1".to_string())),
            backtrace: None,
        }
    }

    #[test]
    fn start_is_idempotent() {
        let (ps, hooks, _) = started(Options::default());
        assert!(ps.started());
        ps.start().unwrap();
        assert_eq!(*hooks.installs.lock().unwrap(), 1);
        assert_eq!(*hooks.signals.lock().unwrap(),
                   vec![Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM]);
    }

    #[test]
    fn stop_uninstalls() {
        let (ps, hooks, _) = started(Options::default());
        ps.stop().unwrap();
        assert!(!ps.started());
        assert!(!hooks.installed());
        ps.stop().unwrap();
        ps.start().unwrap();
        assert!(hooks.installed());
    }

    #[test]
    fn clean_exit_runs_finish_in_order() {
        let (ps, hooks, log) = started(Options::default());
        ps.on_finish(record(&log, "one"));
        ps.on_finish(record(&log, "two"));
        ps.on_terminate(record(&log, "terminate"));
        ps.on_crash(record(&log, "crash"));
        ps.on_hold(record(&log, "hold"));
        ps.always(record(&log, "always"));
        assert_eq!(hooks.fire(HookEvent::Exit), Disposition::Continue);
        assert_eq!(entries(&log),
                   vec!["one:Finish", "two:Finish", "always:Finish"]);
    }

    #[test]
    fn terminate_then_finish_then_exit() {
        let (ps, hooks, log) = started(Options::default());
        ps.on_finish(record(&log, "finish"));
        ps.on_terminate(record(&log, "t1"));
        ps.on_terminate(record(&log, "t2"));
        ps.on_crash(record(&log, "crash"));
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        ps.on_terminate(move |ctx| {
            *slot.lock().unwrap() = Some((ctx.signal(),
                                          ctx.recommended_exit_code(),
                                          ctx.exception().is_none()));
        });
        assert_eq!(hooks.fire(HookEvent::Signal(Signal::SIGINT)),
                   Disposition::Exit(130));
        assert_eq!(entries(&log),
                   vec!["t1:Terminate", "t2:Terminate", "finish:Terminate"]);
        assert_eq!(*seen.lock().unwrap(),
                   Some((Some(Signal::SIGINT), Some(130), true)));
    }

    #[test]
    fn caught_panic_is_not_a_crash() {
        let (ps, hooks, log) = started(Options::default());
        ps.on_finish(record(&log, "finish"));
        ps.on_crash(record(&log, "crash"));
        assert_eq!(hooks.fire(crash_event()), Disposition::Continue);
        assert!(entries(&log).is_empty());
        // the program went on and exited normally
        hooks.fire(HookEvent::Exit);
        assert_eq!(entries(&log), vec!["finish:Finish"]);
    }

    #[test]
    fn panic_out_of_run_is_a_crash() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default(), hooks.clone());
        let log = Log::default();
        ps.on_finish(record(&log, "finish"));
        ps.on_terminate(record(&log, "terminate"));
        ps.on_crash(record(&log, "crash"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot = seen.clone();
        ps.on_crash(move |ctx| {
            let crash = ctx.exception().expect("crash context");
            slot.lock().unwrap().push((crash.message().to_string(),
                                       crash.location().map(String::from),
                                       ctx.signal()));
        });
        let fire = hooks.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            ps.run(|| -> u8 {
                fire.fire(crash_event());
                panic::resume_unwind(Box::new("boom"))
            })
        }));
        assert_eq!(*result.unwrap_err().downcast::<&str>().unwrap(), "boom");
        assert_eq!(entries(&log), vec!["crash:Crash", "finish:Crash"]);
        assert_eq!(*seen.lock().unwrap(),
                   vec![("boom".to_string(),
                         Some("src/main.rs:1:1".to_string()), None)]);
        // the exit hook fires again once the runtime exits
        hooks.fire(HookEvent::Exit);
        assert_eq!(entries(&log), vec!["crash:Crash", "finish:Crash"]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unwind_without_hook_uses_payload() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default(), hooks.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot = seen.clone();
        ps.on_crash(move |ctx| {
            let crash = ctx.exception().expect("crash context");
            slot.lock().unwrap().push((crash.message().to_string(),
                                       crash.location().is_none(),
                                       ctx.traceback().is_none()));
        });
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            ps.run(|| -> u8 {
                panic::resume_unwind(Box::new(String::from("lost")))
            })
        }));
        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![("lost".to_string(), true, true)]);
    }

    #[test]
    fn shared_handler_runs_once() {
        let (ps, hooks, log) = started(Options::default());
        let h = ps.on_terminate(record(&log, "both"));
        assert!(ps.add_finish_handler(h.clone()));
        assert!(!ps.add_terminate_handler(h));
        hooks.fire(HookEvent::Signal(Signal::SIGTERM));
        assert_eq!(entries(&log), vec!["both:Terminate"]);
    }

    #[test]
    fn handler_requests_exit() {
        let (ps, hooks, log) = started(Options::default()
                                       .exit_after_terminate(false));
        ps.on_terminate(|ctx| ctx.exit(7));
        ps.on_terminate(record(&log, "skipped"));
        ps.on_finish(record(&log, "finish"));
        ps.on_hold(record(&log, "hold"));
        assert_eq!(hooks.fire(HookEvent::Signal(Signal::SIGTERM)),
                   Disposition::Exit(7));
        assert_eq!(entries(&log), vec!["finish:Terminate"]);
    }

    #[test]
    fn held_terminate() {
        let (ps, hooks, log) = started(Options::default()
                                       .exit_after_terminate(false));
        ps.on_terminate(record(&log, "terminate"));
        ps.on_finish(record(&log, "finish"));
        ps.on_hold(record(&log, "hold"));
        ps.always(record(&log, "always"));
        assert_eq!(hooks.fire(HookEvent::Signal(Signal::SIGINT)),
                   Disposition::Continue);
        assert_eq!(entries(&log),
                   vec!["terminate:Terminate", "hold:Terminate",
                        "always:Terminate"]);
        // called handlers were forgotten, a second signal runs them again
        hooks.fire(HookEvent::Signal(Signal::SIGINT));
        assert_eq!(entries(&log).len(), 6);
        hooks.fire(HookEvent::Exit);
        assert_eq!(entries(&log)[6..].to_vec(),
                   vec!["finish:Finish", "always:Finish"]);
    }

    #[test]
    fn quit_inside_run() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default(), hooks.clone());
        let log = Log::default();
        ps.on_quit(record(&log, "quit"));
        ps.on_finish(record(&log, "finish"));
        ps.on_crash(record(&log, "crash"));
        let result = ps.run(|| -> u8 { quit(3) }).unwrap();
        assert_eq!(result, None);
        assert!(ps.started());
        assert_eq!(*hooks.exits.lock().unwrap(), vec![3]);
        assert_eq!(entries(&log), vec!["quit:Quit", "finish:Quit"]);
    }

    #[test]
    fn quit_handler_changes_code() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default(), hooks.clone());
        let codes = Arc::new(Mutex::new(Vec::new()));
        let slot = codes.clone();
        ps.on_quit(move |ctx| {
            slot.lock().unwrap().push(ctx.exit_code());
            ctx.exit(42);
        });
        ps.run(|| -> u8 { quit(0) }).unwrap();
        assert_eq!(*codes.lock().unwrap(), vec![Some(0)]);
        assert_eq!(*hooks.exits.lock().unwrap(), vec![42]);
    }

    #[test]
    fn held_quit_returns() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default().exit_after_quit(false),
                                    hooks.clone());
        let log = Log::default();
        ps.on_quit(record(&log, "quit"));
        ps.on_hold(record(&log, "hold"));
        ps.on_finish(record(&log, "finish"));
        assert_eq!(ps.run(|| -> u8 { quit(1) }).unwrap(), None);
        assert!(hooks.exits.lock().unwrap().is_empty());
        assert_eq!(entries(&log), vec!["quit:Quit", "hold:Quit"]);
    }

    #[test]
    fn run_returns_value() {
        let hooks = FakeHooks::default();
        let ps = PubSub::with_hooks(Options::default(), hooks.clone());
        let log = Log::default();
        ps.on_quit(record(&log, "quit"));
        assert_eq!(ps.run(|| 5).unwrap(), Some(5));
        assert!(entries(&log).is_empty());
        assert!(hooks.exits.lock().unwrap().is_empty());
    }

    #[test]
    fn reset_allows_second_round() {
        let (ps, hooks, log) = started(Options::default());
        ps.on_finish(record(&log, "finish"));
        hooks.fire(HookEvent::Exit);
        hooks.fire(HookEvent::Exit);
        assert_eq!(entries(&log).len(), 1);
        ps.reset();
        hooks.fire(HookEvent::Exit);
        assert_eq!(entries(&log).len(), 2);
    }

    #[test]
    fn handler_registers_another() {
        let (ps, hooks, log) = started(Options::default());
        let inner = ps.clone();
        let late = log.clone();
        ps.on_terminate(move |_| {
            let log = late.clone();
            inner.on_finish(move |ctx| {
                log.lock().unwrap().push(format!("late:{:?}", ctx.event()));
            });
        });
        hooks.fire(HookEvent::Signal(Signal::SIGQUIT));
        assert_eq!(entries(&log), vec!["late:Terminate"]);
    }

    #[test]
    fn dropped_handle_keeps_handlers() {
        let hooks = FakeHooks::default();
        let log = Log::default();
        {
            let ps = PubSub::with_hooks(Options::default(), hooks.clone());
            ps.on_finish(record(&log, "finish"));
            ps.start().unwrap();
        }
        assert_eq!(hooks.fire(HookEvent::Signal(Signal::SIGTERM)),
                   Disposition::Exit(143));
        assert_eq!(entries(&log), vec!["finish:Terminate"]);
    }

    #[test]
    #[serial]
    fn signal_waits_for_registry_lock() {
        let ps = PubSub::with_options(Options::new()
            .exit_after_terminate(false)
            .signals(vec!["SIGUSR1"]));
        let log = Log::default();
        ps.on_terminate(record(&log, "terminate"));
        ps.start().unwrap();
        {
            let _state = ps.state();
            raise(Signal::SIGUSR1).unwrap();
            assert!(entries(&log).is_empty());
        }
        assert_eq!(entries(&log), vec!["terminate:Terminate"]);
        ps.stop().unwrap();
    }
}
