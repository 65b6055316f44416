use std::process::ExitCode;

use clap::Parser;

use botcheck::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` is optional; real environment variables still win.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = botcheck::logging::init(cli.log_json, cli.log_dir.as_deref());

    tracing::info!("Starting botcheck v{}", env!("CARGO_PKG_VERSION"));
    botcheck::run(cli).await
}
