//! Concierge CLI and fulfillment server entry point.
//!
//! Binary name: `concierge`
//!
//! Parses CLI arguments, sets up tracing, loads the deployment configuration,
//! then dispatches to the command handler or starts the fulfillment server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,concierge_core=debug,concierge_infra=debug",
        _ => "trace",
    };
    concierge_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    concierge_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "concierge", &mut std::io::stdout());
        return Ok(());
    }

    match cli.command {
        Commands::Plan { config } => {
            let config = cli::load_config(config.as_deref()).await?;
            cli::plan::plan(&config, cli.json)?;
        }

        Commands::Deploy { config, concurrent } => {
            let config = cli::load_config(config.as_deref()).await?;
            cli::deploy::deploy(&config, concurrent, cli.json, cli.quiet).await?;
        }

        Commands::Synth { config, out } => {
            let config = cli::load_config(config.as_deref()).await?;
            cli::synth::synth(&config, &out, cli.json).await?;
        }

        Commands::Respond { file } => {
            cli::respond::respond(file.as_deref()).await?;
        }

        Commands::Serve { port, host, config } => {
            let config = cli::load_config(config.as_deref()).await?;
            let state = AppState::new(config);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Concierge fulfillment listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
