mod cli;
mod upload;

use bucketeer::observability;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload(args) => upload::run(args)?,
    }

    Ok(())
}
