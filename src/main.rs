mod cli;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "crel",
    version,
    about = "Static cost relations for data-parallel kernels"
)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a feature polynomial per kernel
    Analyze(cli::analyze::AnalyzeArgs),
    /// List the runtime variables of each kernel
    Vars(cli::vars::VarsArgs),
    /// Parse a .kir file and report its loop nests
    Check(cli::check::CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Analyze(args) => cli::analyze::cmd_analyze(args),
        Command::Vars(args) => cli::vars::cmd_vars(args),
        Command::Check(args) => cli::check::cmd_check(args),
    };
    if let Err(e) = result {
        e.render();
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so reports on stdout stay pipeable. `RUST_LOG` wins over
/// `-v` when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "crel=warn",
        1 => "crel=info",
        2 => "crel=debug",
        _ => "crel=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
