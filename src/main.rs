mod cmd;
mod config;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use okteto_api::OktetoClientFactory;
use okteto_k8s::KubeClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cmd::{KubetokenArgs, KubetokenCmd, LogsArgs, LogsCmd};
use config::Settings;

/// Okteto - develop and preview applications on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "okteto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Amount of information logged to stderr (debug, info, warn, error)
    #[arg(long, global = true, env = "OKTETO_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a dynamic kubernetes token in the exec credential format
    #[command(hide = true)]
    Kubetoken(KubetokenArgs),

    /// Follow the logs of remote pipeline and destroy-all operations
    Logs(LogsArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries command output, diagnostics go to stderr
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let settings = Settings::from_env()?;
    let store = Arc::new(settings.load_store()?);
    let lookup = Arc::new(KubeClient::new_or_empty());
    let provider = Arc::new(OktetoClientFactory);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted");
            interrupt.cancel();
        }
    });

    let mut stdout = std::io::stdout().lock();
    match command {
        Command::Kubetoken(args) => {
            KubetokenCmd::new(store, lookup, provider, settings.validation_timeout)
                .run(&cancel, args, settings.token, &mut stdout)
                .await
        }
        Command::Logs(args) => {
            LogsCmd::new(store, lookup, provider)
                .run(&cancel, args, settings.url, settings.token, &mut stdout)
                .await
        }
    }
}
