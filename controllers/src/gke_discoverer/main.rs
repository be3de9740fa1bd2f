use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::{
    credentials::CertificateStore,
    directory::GkeDirectory,
    notifier::PrometheusReloader,
    reconciler::{Reconciler, ReconcilerConfig, TickOutcome},
};

mod credentials;
mod differ;
mod directory;
mod error;
mod merger;
mod notifier;
mod reconciler;
mod settings;
mod targets;

/// Keep Prometheus Kubernetes scrape configs in sync with the GKE clusters of a project
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Config file to use
    #[clap(short, long, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Run a single reconciliation and exit
    #[clap(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let cfg = settings::load(&args.config)?;
    tracing::info!("GKE discoverer started for project {}", cfg.gcp_project);

    let directory = GkeDirectory::new(&cfg.directory_endpoint, cfg.access_token.to_owned());
    let notifier = PrometheusReloader::new(&cfg.prometheus_endpoint);
    let mut reconciler = Reconciler::new(
        ReconcilerConfig {
            project: cfg.gcp_project.to_owned(),
            store: CertificateStore::new(&cfg.certificate_store),
            document: PathBuf::from(&cfg.prometheus_config),
            roles: cfg.roles.to_owned(),
        },
        directory,
        notifier,
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down");
                trigger.cancel();
            },
            Err(e) => tracing::warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    if args.once {
        match reconciler.tick(&shutdown).await? {
            TickOutcome::Unchanged => tracing::info!("No difference in cluster membership"),
            TickOutcome::Applied(change) => tracing::info!("{:?}", change),
        }
        if let Some(known) = reconciler.known() {
            tracing::info!("{} clusters configured", known.len());
        }
        return Ok(());
    }

    reconciler
        .run(Duration::from_secs(cfg.poll_time), shutdown)
        .await;
    Ok(())
}
