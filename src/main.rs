//! Linestep - Interactive line-stepping script debugger
//!
//! Entry point that handles CLI argument parsing and launches the REPL.

use clap::Parser;
use linestep::ui::cli::run_cli;

/// Linestep: step a script one line at a time
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script to load into the session at startup
    script: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    // 1. Parse command line arguments
    let args = Args::parse();

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    ))
    .init();

    log::info!("linestep core initialized");
    log::debug!("script: {:?}", args.script);

    println!("[*] Linestep v{}", env!("CARGO_PKG_VERSION"));
    run_cli(args.script)?;

    Ok(())
}
