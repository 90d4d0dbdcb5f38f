//! Offline replay tool for the portal engine.
//!
//! Keeps a sled-backed portal state store in a data directory and advances
//! it one beacon height at a time, either from a list of actions (producing
//! the instructions) or from an already decided instruction list.

mod args;
mod cmd;
mod logging;

use std::process;

use args::resolve_context_and_subcommand;
use cmd::exec_subc;

fn main() {
    let args: args::Args = argh::from_env();
    logging::init(args.json_logs);

    let inner = || -> anyhow::Result<()> {
        let (ctx, subc) = resolve_context_and_subcommand(args)?;
        exec_subc(subc, &ctx)
    };
    if let Err(e) = inner() {
        eprintln!("ERROR\n{e:?}");
        process::exit(1);
    }
}
