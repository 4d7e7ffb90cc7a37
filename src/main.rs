//! `opjournal` - resumable journal for file rename and rewrite operations.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opjournal::cli::{Cli, Command};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Schema => opjournal::manifest::generate_schema().map(|schema| {
            println!("{}", schema);
            opjournal::exit_codes::exit::SUCCESS
        }),
        Command::Apply(args) => opjournal::engine::apply(args),
        Command::Status(args) => opjournal::engine::status(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            opjournal::exit_codes::for_error(&e)
        }
    };
    std::process::exit(exit_code);
}
