use clap::Parser;

use rally_sync::cli::args::Cli;
use rally_sync::cli::commands;
use rally_sync::error::ExitCode;
use rally_sync::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match commands::dispatch(cli).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
