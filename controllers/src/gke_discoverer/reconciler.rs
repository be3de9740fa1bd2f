use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    time::Duration,
};

use resources::objects::{DiscoverySet, RoleTable};
use tokio::{select, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    credentials::{self, CertificateStore},
    differ::DiscoveryDiff,
    directory::ClusterDirectory,
    error::{CredentialError, ReconcileError},
    merger::ConfigDocument,
    notifier::ReloadNotifier,
    targets::build_target_groups,
};

/// What a completed tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Membership is the same as last committed; nothing was written.
    Unchanged,
    Applied(AppliedChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedChange {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    /// Clusters left out of this tick because their credentials did not decode.
    pub skipped: BTreeSet<String>,
    /// Previously skipped clusters whose credentials decode now.
    pub recovered: BTreeSet<String>,
    pub target_groups: usize,
    /// False when the document was written but Prometheus could not be told.
    pub reloaded: bool,
}

/// Where the reconciler reads from and writes to.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub project: String,
    pub store: CertificateStore,
    pub document: PathBuf,
    pub roles: RoleTable,
}

/// Keeps the Prometheus scrape configs in line with the clusters of a project.
/// Holds the last committed discovery set; a tick only replaces it once the
/// document has been written.
pub struct Reconciler<D, N> {
    config: ReconcilerConfig,
    directory: D,
    notifier: N,
    known: Option<DiscoverySet>,
    /// Known clusters without scrape configs because their credentials did not decode.
    pending: BTreeSet<String>,
}

impl<D: ClusterDirectory, N: ReloadNotifier> Reconciler<D, N> {
    pub fn new(config: ReconcilerConfig, directory: D, notifier: N) -> Self {
        Self {
            config,
            directory,
            notifier,
            known: None,
            pending: BTreeSet::new(),
        }
    }

    /// Last committed discovery set, `None` before the first successful tick.
    pub fn known(&self) -> Option<&DiscoverySet> {
        self.known.as_ref()
    }

    /// Tick every `period` until `shutdown` fires. The first tick runs immediately.
    pub async fn run(&mut self, period: Duration, shutdown: CancellationToken) {
        tracing::info!(
            "Reconciling clusters of project {} every {}s",
            self.config.project,
            period.as_secs()
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {},
            }

            match self.tick(&shutdown).await {
                Ok(TickOutcome::Unchanged) => tracing::info!("No difference in cluster membership"),
                Ok(TickOutcome::Applied(change)) => log_change(&change),
                Err(ReconcileError::Cancelled) => break,
                Err(e) => tracing::warn!("Reconciliation aborted, caused by: {}", e),
            }
        }

        tracing::info!("Reconciler stopped");
    }

    /// Run one reconciliation. On error nothing is committed and the document
    /// on disk is left as it was.
    pub async fn tick(&mut self, shutdown: &CancellationToken) -> Result<TickOutcome, ReconcileError> {
        let records = select! {
            biased;
            _ = shutdown.cancelled() => return Err(ReconcileError::Cancelled),
            res = self.directory.list_clusters(&self.config.project) => {
                res.map_err(ReconcileError::Directory)?
            },
        };
        let count = records.len();
        let fetched: DiscoverySet = records.into_iter().collect();
        if fetched.len() < count {
            tracing::warn!(
                "Directory reported {} duplicate cluster names",
                count - fetched.len()
            );
        }

        let diff = DiscoveryDiff::between(self.known.as_ref(), &fetched);
        let recovered: BTreeSet<String> = self
            .pending
            .iter()
            .filter(|name| {
                fetched
                    .get(name)
                    .map_or(false, |record| credentials::decode(record).is_ok())
            })
            .cloned()
            .collect();
        if !diff.changed && recovered.is_empty() {
            return Ok(TickOutcome::Unchanged);
        }
        tracing::info!(
            "Detected change in clusters, added: {:?}, removed: {:?}, recovered: {:?}",
            diff.added,
            diff.removed,
            recovered
        );
        let mut next = diff.apply(self.known.as_ref(), &fetched);
        // Pending clusters are retried with what the directory reports now.
        for name in self.pending.iter() {
            if !next.contains(name) {
                continue;
            }
            if let Some(record) = fetched.get(name) {
                next.insert(record.to_owned());
            }
        }

        check_cancelled(shutdown)?;
        let mut materialized = BTreeMap::new();
        let mut skipped = BTreeSet::new();
        for name in next.sorted_names() {
            let record = match next.get(name) {
                Some(record) => record,
                None => continue,
            };
            match self.config.store.materialize(record) {
                Ok(paths) => {
                    materialized.insert(name.to_owned(), paths);
                },
                Err(e @ CredentialError::Decode { .. }) => {
                    tracing::warn!("Skipping cluster {}, caused by: {}", name, e);
                    skipped.insert(name.to_owned());
                },
                Err(CredentialError::Write { path, source }) => {
                    return Err(ReconcileError::Persistence { path, source });
                },
            }
        }

        let groups = build_target_groups(&next, &materialized, &self.config.roles);

        check_cancelled(shutdown)?;
        let path = &self.config.document;
        let mut document = ConfigDocument::load(path)?;
        document
            .replace_managed(&groups)
            .map_err(|reason| ReconcileError::document(path, reason))?;
        document.persist(path)?;

        self.known = Some(next);
        self.pending = skipped.clone();

        for name in diff.removed.iter() {
            if let Err(e) = self.config.store.remove(name) {
                tracing::warn!("Failed to remove credentials of cluster {}: {}", name, e);
            }
        }

        tracing::info!("Reloading Prometheus config");
        let reloaded = match self.notifier.reload().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Prometheus reload failed, caused by: {:#}", e);
                false
            },
        };

        Ok(TickOutcome::Applied(AppliedChange {
            added: diff.added,
            removed: diff.removed,
            skipped,
            recovered,
            target_groups: groups.len(),
            reloaded,
        }))
    }
}

fn check_cancelled(shutdown: &CancellationToken) -> Result<(), ReconcileError> {
    if shutdown.is_cancelled() {
        Err(ReconcileError::Cancelled)
    } else {
        Ok(())
    }
}

fn log_change(change: &AppliedChange) {
    tracing::info!(
        added = ?change.added,
        removed = ?change.removed,
        skipped = ?change.skipped,
        recovered = ?change.recovered,
        target_groups = change.target_groups,
        reloaded = change.reloaded,
        "Applied cluster membership change"
    );
}
