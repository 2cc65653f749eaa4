// tests/backlog_signals.rs
//
// Advisory backlog notices: one per threshold crossing, in either direction.

use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use listing_sentinel::archive::MemoryArchive;
use listing_sentinel::extract::SourceExtractors;
use listing_sentinel::ingest::backlog::{BacklogMonitor, BacklogSignal};
use listing_sentinel::ingest::worker::{IngestWorker, Maintenance, WorkerConfig};
use listing_sentinel::ledger::MemoryLedger;
use listing_sentinel::notify::log::RecordingChannel;
use listing_sentinel::status::PipelineStatus;

const MAINTAINER: i64 = 99;

fn worker_with_maintenance(step: usize) -> (IngestWorker, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::new());
    let (tx, _rx) = unbounded_channel();
    let w = IngestWorker::new(
        WorkerConfig {
            backlog_step: step,
            archive_ceiling: 10_000,
        },
        SourceExtractors::default(),
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryArchive::new()),
        tx,
        PipelineStatus::new().handle("Worker"),
    )
    .with_maintenance(Some(Maintenance {
        channel: channel.clone(),
        subscriber: MAINTAINER,
    }));
    (w, channel)
}

async fn notices(w: &mut IngestWorker, channel: &RecordingChannel) -> Vec<String> {
    w.flush_notices().await;
    channel
        .sent_to(MAINTAINER)
        .into_iter()
        .map(|p| p.text)
        .collect()
}

#[tokio::test]
async fn crossing_100_then_200_then_falling_to_150() {
    let (mut w, channel) = worker_with_maintenance(100);

    for depth in [1, 50, 99, 100, 130, 180] {
        w.observe_backlog(depth).await;
    }
    assert_eq!(notices(&mut w, &channel).await, vec!["Queued offers growing: 100"]);

    for depth in [199, 200, 250] {
        w.observe_backlog(depth).await;
    }
    let all = notices(&mut w, &channel).await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[1], "Queued offers growing: 200");

    for depth in [190, 150, 160, 120] {
        w.observe_backlog(depth).await;
    }
    let all = notices(&mut w, &channel).await;
    assert_eq!(all.len(), 3, "one draining notice, not two: {all:?}");
    assert_eq!(all[2], "Queued offers draining: 190");
}

#[test]
fn jump_over_several_thresholds_reports_each() {
    let mut m = BacklogMonitor::new(100);
    let signals = m.observe(320);
    assert_eq!(
        signals,
        vec![
            BacklogSignal::Growing { threshold: 100, depth: 320 },
            BacklogSignal::Growing { threshold: 200, depth: 320 },
            BacklogSignal::Growing { threshold: 300, depth: 320 },
        ]
    );
    assert_eq!(m.level_threshold(), 300);

    assert_eq!(
        m.observe(0),
        vec![
            BacklogSignal::Draining { threshold: 300, depth: 0 },
            BacklogSignal::Draining { threshold: 200, depth: 0 },
            BacklogSignal::Draining { threshold: 100, depth: 0 },
        ]
    );
}
