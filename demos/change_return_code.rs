//! Change the exit code of code that quits outside of your control

extern crate exit_hooks;

use exit_hooks::{quit, PubSub};


fn vendored_main() {
    println!("Doing things, then quitting with 0");
    quit(0);
}

fn main() {
    let ps = PubSub::new();

    ps.on_quit(|ctx| {
        println!("Asked to quit with {:?}, exiting with 42 instead",
                 ctx.exit_code());
        ctx.exit(42);
    });

    ps.run(vendored_main).unwrap();
}
