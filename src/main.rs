use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kbindex::cli::commands::{
    handle_articles, handle_backup, handle_config, handle_devdocs, handle_index, handle_pdf,
    handle_posts, handle_search, handle_status, handle_youtube,
};
use kbindex::cli::{Cli, Commands};
use kbindex::models::{Config, OutputFormat};

/// `RUST_LOG` wins; otherwise `info`, or crate-level `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "info,kbindex=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::load() {
        Ok(resolved) => {
            if let Some(path) = &resolved.path {
                tracing::debug!(path = %path.display(), "loaded config");
            }
            resolved.config
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable config, using defaults");
            Config::default()
        }
    };
    let format = cli.format.unwrap_or_default();

    tokio::select! {
        result = run_command(cli, config, format) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(cli: Cli, config: Config, format: OutputFormat) -> Result<()> {
    let verbose = cli.verbose;
    if let Commands::Config(cmd) = cli.command {
        return handle_config(cmd, format).await;
    }

    let ctx = cli.context(config)?;
    tracing::debug!(
        stage = %ctx.env.stage,
        brand = %ctx.env.brand,
        language = %ctx.env.language,
        index = %ctx.env.index_name,
        "resolved environment"
    );

    match cli.command {
        Commands::Articles(cmd) => {
            handle_articles(cmd, &ctx, format).await?;
        }
        Commands::Pdf(cmd) => {
            handle_pdf(cmd, &ctx, format).await?;
        }
        Commands::Posts(cmd) => {
            handle_posts(cmd, &ctx, format).await?;
        }
        Commands::Youtube(cmd) => {
            handle_youtube(cmd, &ctx, format).await?;
        }
        Commands::Devdocs(cmd) => {
            handle_devdocs(cmd, &ctx, format).await?;
        }
        Commands::Index(cmd) => {
            handle_index(cmd, &ctx, format, verbose).await?;
        }
        Commands::Search(args) => {
            handle_search(args, &ctx, format, verbose).await?;
        }
        Commands::Backup(args) => {
            handle_backup(args, &ctx, format).await?;
        }
        Commands::Status => {
            handle_status(&ctx, format).await?;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
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
