//! calbrief CLI entry point.

use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tracing::{debug, info};

use calbrief_core::{TracingConfig, init_tracing};
use calbrief_providers::caldav::CalDavSource;

use calbrief_client::cli::Cli;
use calbrief_client::config::DigestConfig;
use calbrief_client::error::ClientResult;
use calbrief_client::messenger::build_messenger;
use calbrief_client::pipeline::DigestPipeline;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine, everything may come from the environment.
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => {
            eprintln!("error: failed to load .env: {}", e);
            return ExitCode::FAILURE;
        }
        _ => {}
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    init_tracing(tracing_config.with_format(cli.log_format))?;

    let config = DigestConfig::from_cli(&cli)?;
    debug!(?config, "Loaded configuration");
    info!(
        provider = %config.provider,
        messenger = %config.messenger,
        days = config.duration_days,
        "Building digest"
    );

    let source = CalDavSource::new(config.caldav.source.clone())?;
    let digest = DigestPipeline::from_config(&config)
        .run(&source, &Local::now())
        .await?;

    let Some(delivery) = config.delivery else {
        println!("{}", digest);
        return Ok(());
    };

    let messenger = build_messenger(&delivery.messenger)?;
    let receipt = messenger.send(&delivery.channel_id, &digest).await?;
    info!(messenger = %receipt.messenger, id = %receipt.id, "Digest delivered");

    Ok(())
}
