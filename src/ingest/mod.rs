// src/ingest/mod.rs
pub mod backlog;
pub mod watcher;
pub mod worker;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watcher_polls_total", "Index polls attempted by source watchers.");
        describe_counter!(
            "watcher_poll_errors_total",
            "Index polls that failed and kept the previous snapshot."
        );
        describe_counter!(
            "watcher_discovered_total",
            "Item URLs enqueued as new by source watchers."
        );
        describe_counter!(
            "worker_duplicates_total",
            "Discovered URLs skipped because the ledger already had them."
        );
        describe_counter!(
            "worker_enrichment_errors_total",
            "Discovered URLs dropped because item extraction failed."
        );
        describe_counter!(
            "worker_ledger_errors_total",
            "Items not forwarded because the ledger write failed."
        );
        describe_counter!("worker_ingested_total", "Items persisted and forwarded.");
        describe_gauge!(
            "worker_backlog_depth",
            "Discovered-URL queue depth seen by the worker."
        );
        describe_counter!("archive_rotations_total", "Archive file rotations.");
        describe_counter!(
            "dispatch_matched_total",
            "Item/subscriber pairs that passed every filter."
        );
        describe_counter!(
            "dispatch_delivery_errors_total",
            "Notifications the channel failed to deliver."
        );
    });
}
