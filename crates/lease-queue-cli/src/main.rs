use clap::Parser;
use lease_queue_cli::{exit_code_for, init_logging, run, Cli};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);

        std::process::exit(exit_code_for(&e));
    }
}
