//! supervisor.rs: wires the queues, starts every unit, and stops them.
//!
//! Units: one `SourceWatcher` per source, one `IngestWorker`, one `Dispatcher`.
//! A unit that fails or panics is marked `Error -- ...` in the status map and
//! is not restarted.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::archive::ArchiveSink;
use crate::dispatch::Dispatcher;
use crate::extract::SourceExtractors;
use crate::ingest::ensure_metrics_described;
use crate::ingest::watcher::SourceWatcher;
use crate::ingest::worker::{IngestWorker, Maintenance, WorkerConfig};
use crate::ledger::Ledger;
use crate::model::Source;
use crate::notify::NotificationChannel;
use crate::status::{PipelineStatus, StatusHandle};
use crate::stop::{stop_pair, StopTrigger};
use crate::subscribers::store::SubscriberStore;
use crate::subscribers::SubscriberId;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub poll_interval_secs: u64,
    pub backlog_step: usize,
    pub archive_ceiling: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            backlog_step: 100,
            archive_ceiling: 10_000,
        }
    }
}

/// Everything the pipeline is built from.
pub struct PipelineParts {
    pub sources: Vec<Source>,
    pub extractors: SourceExtractors,
    pub ledger: Arc<dyn Ledger>,
    pub archive: Arc<dyn ArchiveSink>,
    pub store: Arc<dyn SubscriberStore>,
    pub channel: Arc<dyn NotificationChannel>,
    pub maintenance_subscriber: Option<SubscriberId>,
    pub settings: PipelineSettings,
}

struct Unit {
    name: String,
    handle: JoinHandle<()>,
}

pub struct Supervisor {
    status: PipelineStatus,
    trigger: StopTrigger,
    units: Vec<Unit>,
}

impl Supervisor {
    /// Build the queues and spawn all units. Fails only when there is nothing
    /// sensible to run.
    pub fn start(parts: PipelineParts) -> Result<Self> {
        if parts.sources.is_empty() {
            bail!("no units started: no sources configured");
        }
        let mut seen = HashSet::new();
        for s in &parts.sources {
            if !seen.insert(&s.id) {
                bail!("duplicate source id `{}`", s.id);
            }
        }
        ensure_metrics_described();

        let status = PipelineStatus::new();
        let (trigger, stop) = stop_pair();
        let (discovered_tx, discovered_rx) = unbounded_channel();
        let (items_tx, items_rx) = unbounded_channel();
        let mut units = Vec::new();

        for source in parts.sources {
            let name = format!("Watcher {}", source.id);
            let handle = status.handle(name.clone());
            let watcher = SourceWatcher::new(
                source,
                parts.extractors.clone(),
                discovered_tx.clone(),
                parts.settings.poll_interval_secs,
                handle.clone(),
            );
            units.push(spawn_unit(name, handle, watcher.run(stop.clone())));
        }
        // watchers hold the only senders now
        drop(discovered_tx);

        let handle = status.handle("Worker");
        let maintenance = parts.maintenance_subscriber.map(|subscriber| Maintenance {
            channel: parts.channel.clone(),
            subscriber,
        });
        let worker = IngestWorker::new(
            WorkerConfig {
                backlog_step: parts.settings.backlog_step,
                archive_ceiling: parts.settings.archive_ceiling,
            },
            parts.extractors,
            parts.ledger,
            parts.archive,
            items_tx,
            handle.clone(),
        )
        .with_maintenance(maintenance);
        units.push(spawn_unit(
            "Worker".into(),
            handle,
            worker.run(discovered_rx, stop.clone()),
        ));

        let handle = status.handle("Dispatcher");
        let dispatcher = Dispatcher::new(parts.store, parts.channel, handle.clone());
        units.push(spawn_unit(
            "Dispatcher".into(),
            handle,
            dispatcher.run(items_rx, stop),
        ));

        info!(target: "supervisor", units = units.len(), "pipeline started");
        Ok(Self {
            status,
            trigger,
            units,
        })
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.clone()
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn all_finished(&self) -> bool {
        self.units.iter().all(|u| u.handle.is_finished())
    }

    /// Signal every unit to stop and wait for all of them, logging the status
    /// row every `report_every` meanwhile. Returns the final status map.
    pub async fn shutdown(self, report_every: Duration) -> BTreeMap<String, String> {
        self.trigger.stop();
        info!(target: "supervisor", "shutdown requested");

        let poll = Duration::from_millis(50).min(report_every);
        let mut since_report = Duration::ZERO;
        while !self.all_finished() {
            tokio::time::sleep(poll).await;
            since_report += poll;
            if since_report >= report_every {
                since_report = Duration::ZERO;
                info!(target: "supervisor", status = %self.status.render_row(), "waiting for units");
            }
        }

        for unit in self.units {
            // monitor tasks never fail; their inner task's fate is in the status map
            let _ = unit.handle.await;
        }
        info!(target: "supervisor", status = %self.status.render_row(), "all units stopped");
        self.status.snapshot()
    }
}

/// Spawn `fut` and a monitor that records an error or panic in the unit's status.
fn spawn_unit<F>(name: String, status: StatusHandle, fut: F) -> Unit
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let inner = tokio::spawn(fut);
    let label = name.clone();
    let handle = tokio::spawn(async move {
        match inner.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(target: "supervisor", unit = %label, "unit failed: {e:#}");
                status.error(format!("{e:#}"));
            }
            Err(join) => {
                let reason = if join.is_panic() { "panicked" } else { "cancelled" };
                error!(target: "supervisor", unit = %label, reason, "unit aborted");
                status.error(reason);
            }
        }
    });
    Unit { name, handle }
}
