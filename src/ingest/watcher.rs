// src/ingest/watcher.rs
use anyhow::{anyhow, Result};
use metrics::counter;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::extract::{FetchError, SourceExtractors};
use crate::model::{Discovered, Source};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::status::StatusHandle;
use crate::stop::StopSignal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// First successful poll: recorded, nothing enqueued.
    Baseline(usize),
    /// Number of new URLs enqueued.
    Discovered(usize),
    /// Poll failed; previous snapshot kept.
    Failed(FetchError),
}

/// Polls one source and enqueues URLs that were not on its previous index.
pub struct SourceWatcher {
    source: Source,
    extractors: SourceExtractors,
    tx: UnboundedSender<Discovered>,
    interval_secs: u64,
    snapshots: SnapshotStore,
    status: StatusHandle,
}

impl SourceWatcher {
    pub fn new(
        source: Source,
        extractors: SourceExtractors,
        tx: UnboundedSender<Discovered>,
        interval_secs: u64,
        status: StatusHandle,
    ) -> Self {
        Self {
            source,
            extractors,
            tx,
            interval_secs,
            snapshots: SnapshotStore::new(),
            status,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub async fn run(mut self, mut stop: StopSignal) -> Result<()> {
        while !stop.is_stopped() {
            self.status.working();
            self.poll_once().await?;

            let status = self.status.clone();
            if stop
                .sleep_secs(self.interval_secs, |left| status.wait_secs(left))
                .await
            {
                break;
            }
        }
        self.status.stopped();
        Ok(())
    }

    /// One poll cycle. Fetch failures are reported in the outcome and leave
    /// the snapshot untouched; only a closed queue is an error.
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        counter!("watcher_polls_total").increment(1);
        let urls = match self.extractors.list_index(&self.source).await {
            Ok(urls) => urls,
            Err(e) => {
                counter!("watcher_poll_errors_total").increment(1);
                warn!(target: "watcher", source = %self.source.id, error = %e, "poll failed, keeping last snapshot");
                return Ok(PollOutcome::Failed(e));
            }
        };

        let baseline = !self.snapshots.has_baseline();
        let fresh = self
            .snapshots
            .advance(Snapshot::new(self.source.id.clone(), urls));

        if baseline {
            let n = self.snapshots.current().map(|s| s.item_urls.len()).unwrap_or(0);
            info!(target: "watcher", source = %self.source.id, items = n, "baseline recorded");
            return Ok(PollOutcome::Baseline(n));
        }

        for url in &fresh {
            let d = Discovered {
                source_id: self.source.id.clone(),
                url: url.clone(),
            };
            self.tx
                .send(d)
                .map_err(|_| anyhow!("discovered-URL queue closed"))?;
        }
        if !fresh.is_empty() {
            counter!("watcher_discovered_total").increment(fresh.len() as u64);
            debug!(target: "watcher", source = %self.source.id, new = fresh.len(), "new items");
        }
        Ok(PollOutcome::Discovered(fresh.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fixture::StaticExtractor;
    use crate::status::PipelineStatus;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn failed_poll_keeps_last_good_snapshot() {
        let ex = Arc::new(StaticExtractor::new("static"));
        ex.push_index("s", ["A", "B"])
            .push_index_failure("s", "timeout")
            .push_index("s", ["A", "B", "C"]);
        let source = Source::new("s", "https://s.test/");
        let (tx, mut rx) = unbounded_channel();
        let mut w = SourceWatcher::new(
            source.clone(),
            SourceExtractors::uniform([&source.id], ex),
            tx,
            1,
            PipelineStatus::new().handle("Watcher s"),
        );

        assert_eq!(w.poll_once().await.unwrap(), PollOutcome::Baseline(2));
        assert!(matches!(w.poll_once().await.unwrap(), PollOutcome::Failed(_)));
        assert_eq!(w.poll_once().await.unwrap(), PollOutcome::Discovered(1));

        assert_eq!(rx.recv().await.unwrap().url, "C");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_an_error() {
        let ex = Arc::new(StaticExtractor::new("static"));
        ex.push_index("s", ["A"]).push_index("s", ["A", "B"]);
        let source = Source::new("s", "https://s.test/");
        let (tx, rx) = unbounded_channel();
        let mut w = SourceWatcher::new(
            source.clone(),
            SourceExtractors::uniform([&source.id], ex),
            tx,
            1,
            PipelineStatus::new().handle("Watcher s"),
        );
        w.poll_once().await.unwrap();
        drop(rx);
        assert!(w.poll_once().await.is_err());
    }
}
