// std
use std::process::ExitCode;

// external
use anyhow::Context;
use clap::Parser;

// internal
use bet_client::cli::{Cli, Command};
use bet_client::records;
use bet_client::{Client, ClientConfig, ClientError, Shutdown};

async fn run(client: &Client, command: Command) -> anyhow::Result<()> {
    let config = client.config();

    if matches!(command, Command::Run | Command::Submit) {
        let bets = records::load_bets(&config.bets_file, config.agency)
            .with_context(|| format!("reading bets from {}", config.bets_file.display()))?;
        tracing::info!(
            "loaded {} bets from {}",
            bets.len(),
            config.bets_file.display()
        );
        client.submit_bets(&bets).await?;
    }

    if matches!(command, Command::Run | Command::Winners) {
        let winners = client.query_winners().await?;
        tracing::info!(
            "action: consulta_ganadores | result: success | cant_ganadores: {}",
            winners.count()
        );
    }
    Ok(())
}

/// A run stopped by SIGTERM/SIGINT is a graceful exit, not a failure.
fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_cancelled)
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = bet_client::logging::init_logging(&cli.log_level) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match ClientConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("action: config | result: fail | error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        "action: config | result: success | client_id: {} | server_address: {} | batch_size: {}",
        config.agency,
        config.server_address,
        config.batch_size
    );

    let shutdown = Shutdown::new();
    let signals = shutdown.listen_for_signals();

    let command = cli.command.unwrap_or_default();
    let client = Client::new(config, shutdown.clone());
    let res = run(&client, command).await;

    // stops the signal task if it is still waiting
    shutdown.trigger();
    if let Err(e) = signals.await {
        tracing::warn!("signal listener ended abnormally: {}", e);
    }

    match res {
        Ok(()) => {
            tracing::info!("action: exit | result: success");
            ExitCode::SUCCESS
        }
        Err(e) if is_cancelled(&e) => {
            tracing::info!("action: exit | result: success | reason: shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("action: exit | result: fail | error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
