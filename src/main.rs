mod cli;
mod colors;
mod directory;
mod discovery;
mod error;
mod kubernetes;
mod registry;
mod selection;
mod session;
mod sink;
mod types;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cli::Cli;
use directory::ClusterDirectory;
use discovery::DiscoveryLoop;
use kubernetes::KubeDirectory;
use sink::{SinkOptions, spawn_sink};
use types::LogMessage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(cli::normalize_args(std::env::args_os()));

    // Diagnostics go to stderr; stdout only carries pod log lines
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Conflicting flags are rejected before touching the cluster
    selection::resolve(
        cli.namespace(),
        cli.all_namespaces,
        kubernetes::DEFAULT_NAMESPACE,
        cli.selector(),
    )?;

    let client_config = kubernetes::load_client_config(cli.kubeconfig_path().as_deref()).await?;
    let directory: Arc<dyn ClusterDirectory> = Arc::new(KubeDirectory::new(client_config.client));

    let policy = selection::resolve_and_validate(
        directory.as_ref(),
        cli.namespace(),
        cli.all_namespaces,
        &client_config.default_namespace,
        cli.selector(),
    )
    .await?;
    debug!("[{}] Resolved selection: {:?}", client_config.context, policy);

    let (log_tx, log_rx) = mpsc::channel::<LogMessage>(cli.buffer_size.max(1));
    let sink = spawn_sink(
        log_rx,
        std::io::stdout(),
        SinkOptions {
            timestamps: cli.timestamps,
        },
    );

    let cancel = CancellationToken::new();
    let discovery = DiscoveryLoop::new(
        directory,
        policy,
        cli.discovery_config(),
        log_tx,
        cancel.clone(),
    );
    let mut discovery_task = tokio::spawn(discovery.run());

    let result = tokio::select! {
        res = &mut discovery_task => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping all log streams");
            cancel.cancel();
            discovery_task.await
        }
    };

    // The discovery loop owned the last sender; wait for buffered lines to flush
    sink.await?;

    result??;
    Ok(())
}
