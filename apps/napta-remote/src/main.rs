use clap::Parser;
use napta_remote_core::telemetry;
use napta_remote_core::terminal::{self, Cli, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = telemetry::init(&cli.logging.to_config()) {
        eprintln!("{}", CliError::Logging(err.to_string()));
        std::process::exit(1);
    }

    if let Err(err) = terminal::run(cli).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
