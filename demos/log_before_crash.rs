//! Save the details of an unhandled panic to `crash.log`
//!
//! The default panic hook is not called, so the user only sees a short
//! message instead of the panic output. Run with `RUST_BACKTRACE=1` to get
//! the backtrace in the file too.

extern crate exit_hooks;
extern crate tracing_subscriber;

use std::fs::OpenOptions;
use std::io::Write;

use exit_hooks::{Options, PubSub};
use tracing_subscriber::EnvFilter;


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ps = PubSub::with_options(Options::new().call_previous_panic_hook(false));

    ps.on_crash(|ctx| {
        let mut file = match OpenOptions::new()
            .create(true).append(true).open("crash.log")
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Can't open crash.log: {}", e);
                return;
            }
        };
        if let Some(crash) = ctx.exception() {
            writeln!(file, "{}", crash).ok();
        }
        if let Some(backtrace) = ctx.traceback() {
            writeln!(file, "{}", backtrace).ok();
        }
        println!("An error has occurred and has been logged in \"crash.log\"");
    });

    ps.run(|| {
        let values: Vec<u32> = Vec::new();
        println!("{}", values[0]);
    }).unwrap();
}
