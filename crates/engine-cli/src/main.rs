//! Riposte UCI front end.

mod uci;

use std::io;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Riposte UCI chess engine", long_about = None)]
struct Args {
    /// Enable debug logging (stderr)
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level),
    );

    log::info!("Riposte starting");

    let stdin = io::stdin();
    let mut session = uci::UciSession::new();
    session.run(stdin.lock())
}
