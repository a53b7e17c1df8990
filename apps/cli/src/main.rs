//! pubcompare CLI: compare two scientific publications with an LLM pipeline.
//!
//! Runs the seven-stage analysis over two `.txt` publications and saves the
//! validated profiles, a JSON snapshot and an HTML report.

mod commands;
mod logging;
mod runtime;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env file is fine; keys may come from the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = pubcompare_shared::load_config()?;
    let guard = logging::init(&config.logging, cli.verbose, &cli.log_format)?;

    let result = runtime::block_on(commands::run(cli, config)).and_then(|r| r);
    guard.close();
    result
}
