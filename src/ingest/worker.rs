// src/ingest/worker.rs
use anyhow::Result;
use chrono::Utc;
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::backlog::{BacklogMonitor, BacklogSignal};
use crate::archive::ArchiveSink;
use crate::extract::{FetchError, SourceExtractors};
use crate::ledger::Ledger;
use crate::model::{Discovered, Item};
use crate::notify::{NotificationChannel, Payload};
use crate::status::StatusHandle;
use crate::stop::{drain_within, StopSignal, SHUTDOWN_GRACE};
use crate::subscribers::SubscriberId;

/// What happened to one discovered URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Already in the ledger.
    Duplicate,
    /// Enrichment failed; the URL is dropped without a ledger entry.
    Dropped(FetchError),
    /// The ledger write failed, so the item was not forwarded.
    LedgerFailed,
    /// Recorded and archived, but the dispatcher is gone.
    QueueClosed,
    Forwarded,
}

/// Where backlog and archive notices go.
#[derive(Clone)]
pub struct Maintenance {
    pub channel: Arc<dyn NotificationChannel>,
    pub subscriber: SubscriberId,
}

pub struct WorkerConfig {
    pub backlog_step: usize,
    pub archive_ceiling: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backlog_step: 100,
            archive_ceiling: 10_000,
        }
    }
}

/// Single consumer of the discovered-URL queue.
pub struct IngestWorker {
    extractors: SourceExtractors,
    ledger: Arc<dyn Ledger>,
    archive: Arc<dyn ArchiveSink>,
    out: UnboundedSender<Item>,
    maintenance: Option<Maintenance>,
    backlog: BacklogMonitor,
    archive_ceiling: usize,
    /// Maintenance sends still in flight.
    notices: JoinSet<()>,
    status: StatusHandle,
}

impl IngestWorker {
    pub fn new(
        cfg: WorkerConfig,
        extractors: SourceExtractors,
        ledger: Arc<dyn Ledger>,
        archive: Arc<dyn ArchiveSink>,
        out: UnboundedSender<Item>,
        status: StatusHandle,
    ) -> Self {
        Self {
            extractors,
            ledger,
            archive,
            out,
            maintenance: None,
            backlog: BacklogMonitor::new(cfg.backlog_step),
            archive_ceiling: cfg.archive_ceiling,
            notices: JoinSet::new(),
            status,
        }
    }

    pub fn with_maintenance(mut self, m: Option<Maintenance>) -> Self {
        self.maintenance = m;
        self
    }

    pub async fn run(
        mut self,
        mut rx: UnboundedReceiver<Discovered>,
        mut stop: StopSignal,
    ) -> Result<()> {
        while !stop.is_stopped() {
            self.status.waiting();
            let next = tokio::select! {
                _ = stop.stopped() => None,
                d = rx.recv() => d,
            };
            let Some(discovered) = next else { break };

            // depth as it was before this URL was taken off the queue
            let depth = rx.len() + 1;
            self.observe_backlog(depth).await;
            self.status.work_depth(depth);

            self.ingest(discovered).await;
            while self.notices.try_join_next().is_some() {}
        }

        let aborted = drain_within(&mut self.notices, SHUTDOWN_GRACE).await;
        if aborted > 0 {
            warn!(target: "worker", aborted, "maintenance notices still running at stop were abandoned");
        }
        self.status.stopped();
        Ok(())
    }

    /// Dedup, enrich, persist, forward. Errors stay inside this call.
    pub async fn ingest(&mut self, discovered: Discovered) -> IngestOutcome {
        if self.ledger.contains(&discovered.url) {
            counter!("worker_duplicates_total").increment(1);
            debug!(target: "worker", url = %discovered.url, "duplicate");
            return IngestOutcome::Duplicate;
        }

        let attrs = match self
            .extractors
            .extract_item(&discovered.source_id, &discovered.url)
            .await
        {
            Ok(a) => a,
            Err(e) => {
                counter!("worker_enrichment_errors_total").increment(1);
                warn!(target: "worker", source = %discovered.source_id, url = %discovered.url, error = %e, "item dropped");
                return IngestOutcome::Dropped(e);
            }
        };
        let item = Item::from_attributes(discovered, attrs, Utc::now());

        if let Err(e) = self.ledger.append(&item.url).await {
            counter!("worker_ledger_errors_total").increment(1);
            error!(target: "worker", url = %item.url, "ledger write failed, not forwarding: {e:#}");
            return IngestOutcome::LedgerFailed;
        }
        if let Err(e) = self.archive.append(&item).await {
            warn!(target: "worker", url = %item.url, "archive write failed: {e:#}");
        }

        if let Err(rejected) = self.out.send(item) {
            warn!(target: "worker", url = %rejected.0.url, "completed-item queue closed; item not dispatched");
            return IngestOutcome::QueueClosed;
        }
        counter!("worker_ingested_total").increment(1);
        IngestOutcome::Forwarded
    }

    /// Emit backlog notices and, on growth, check whether the archive needs rotating.
    pub async fn observe_backlog(&mut self, depth: usize) {
        gauge!("worker_backlog_depth").set(depth as f64);
        for signal in self.backlog.observe(depth) {
            match signal {
                BacklogSignal::Growing { threshold, depth } => {
                    info!(target: "worker", threshold, depth, "backlog growing");
                    self.notify_maintenance(format!("Queued offers growing: {depth}"));
                    self.maybe_rotate_archive().await;
                }
                BacklogSignal::Draining { threshold, depth } => {
                    info!(target: "worker", threshold, depth, "backlog draining");
                    self.notify_maintenance(format!("Queued offers draining: {depth}"));
                }
            }
        }
    }

    async fn maybe_rotate_archive(&mut self) {
        if self.archive.current_record_count() <= self.archive_ceiling {
            return;
        }
        match self.archive.rotate().await {
            Ok(label) => {
                counter!("archive_rotations_total").increment(1);
                info!(target: "worker", file = %label, "archive rotated");
                self.notify_maintenance(format!("New archive file created: {label}"));
            }
            Err(e) => warn!(target: "worker", "archive rotation failed: {e:#}"),
        }
    }

    fn notify_maintenance(&mut self, text: String) {
        let Some(m) = self.maintenance.clone() else { return };
        self.notices.spawn(async move {
            let outcome = m.channel.send(m.subscriber, &Payload::plain(text)).await;
            if !outcome.is_delivered() {
                warn!(target: "worker", subscriber = m.subscriber, ?outcome, "maintenance notice not delivered");
            }
        });
    }

    /// Wait for every maintenance notice handed out so far.
    pub async fn flush_notices(&mut self) {
        while self.notices.join_next().await.is_some() {}
    }
}
