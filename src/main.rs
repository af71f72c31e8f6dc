use clap::Parser;
use rigwatch::cli::{self, Cli, Commands};
use rigwatch::error::Result;
use rigwatch::logging::{init_logging, init_logging_simple};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Validate => {
            init_logging_simple();
            let config = cli::load_config(&cli.config)?;
            cli::validate(&config)?;
        }
        Commands::Simulate {
            duration_secs,
            failure_rate,
            action_delay_secs,
        } => {
            let config = cli::load_config(&cli.config)?;
            init_logging(&config.logging);
            cli::simulate(
                &config,
                duration_secs.map(Duration::from_secs),
                *failure_rate,
                Duration::from_secs(*action_delay_secs),
            )
            .await?;
        }
    }

    Ok(())
}
