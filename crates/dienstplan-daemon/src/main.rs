use clap::Parser;
use tracing::info;

mod app;
mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dienstplan=info,dienstplan_scheduler=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // load config: --config > DIENSTPLAN_CONFIG env > ~/.dienstplan/dienstplan.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("DIENSTPLAN_CONFIG").ok());
    let config =
        dienstplan_core::DienstplanConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            dienstplan_core::DienstplanConfig::default()
        });

    let app = app::App::open(config)?;

    match args.command {
        Command::Run => run(&app).await,
        Command::Operator(command) => cli::execute(&app, command).await,
    }
}

/// Drive the reminder scheduler until Ctrl-C.
async fn run(app: &app::App) -> anyhow::Result<()> {
    let scheduler = app.scheduler()?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));
    info!("Dienstplan scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}
