use clap::Parser;
use sentinel::cli::{self, Cli, Commands};

mod main_runtime;

use main_runtime::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_ref())?;

    init_logging(&config.logging, cli.command.is_tui());

    match cli.command {
        Commands::Run => cli::run_service(config).await,
        Commands::Once {
            format,
            deliver,
            fail_on_unhealthy,
        } => cli::run_once(config, format, deliver, fail_on_unhealthy).await,
        Commands::Dashboard => cli::run_dashboard(config).await,
        Commands::CheckConfig => cli::check_config(&config),
    }
}
