//! itestcontainer - run one container for an integration test until signalled.

use std::process::ExitCode;

use clap::Parser;
use itestcontainer::util;

mod cli;
mod run;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_from(cli::normalize_args(std::env::args()));

    let default_filter = if cli.debug {
        "itestcontainer=debug,itestcontainer_cli=debug"
    } else {
        util::DEFAULT_LOG_FILTER
    };
    util::register_to_tracing(util::env_filter(default_filter));

    match run::execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
