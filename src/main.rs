use anyhow::Result;
use clap::Parser;
use grimoire::{CLIArguments, compile_main, debug_main, validate_main};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let args = CLIArguments::parse();

    let default_level = if args.verbose() { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match args {
        CLIArguments::Compile(args) => compile_main(args),
        CLIArguments::Debug(args) => debug_main(args),
        CLIArguments::Validate(args) => validate_main(args),
    }
}
