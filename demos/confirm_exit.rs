//! Ask for confirmation before exiting on Ctrl+C, `SIGTERM` or `SIGQUIT`
//!
//! A second signal while the question is pending waits for the answer, since
//! terminating signals are blocked while one is handled. `SIGKILL` can't be
//! caught at all.

extern crate exit_hooks;

use std::io::{stdin, stdout, Write};
use std::thread::sleep;
use std::time::Duration;

use exit_hooks::{Options, PubSub};


fn main() {
    // we decide ourselves whether to exit
    let ps = PubSub::with_options(Options::new().exit_after_terminate(false));

    ps.on_terminate(|ctx| {
        print!("Received {:?}. Are you sure you want to exit? [n/Y] ",
               ctx.signal());
        stdout().flush().ok();
        let mut answer = String::new();
        stdin().read_line(&mut answer).ok();
        match answer.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => {
                ctx.exit(ctx.recommended_exit_code().unwrap_or(1));
            }
            _ => {}
        }
    });
    ps.on_hold(|_| println!("Ok, let's keep going"));
    ps.on_finish(|_| println!("Bye"));

    ps.start().unwrap();
    loop {
        println!("Working...");
        sleep(Duration::from_secs(1));
    }
}
