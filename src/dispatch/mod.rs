// src/dispatch/mod.rs
pub mod filter;

use anyhow::Result;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::model::Item;
use crate::notify::{format_item, DeliveryOutcome, NotificationChannel};
use crate::status::StatusHandle;
use crate::stop::{drain_within, StopSignal, SHUTDOWN_GRACE};
use crate::subscribers::store::SubscriberStore;
use crate::subscribers::SubscriberId;

/// Routes completed items to every online subscriber whose filters match.
pub struct Dispatcher {
    store: Arc<dyn SubscriberStore>,
    channel: Arc<dyn NotificationChannel>,
    status: StatusHandle,
    in_flight: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        channel: Arc<dyn NotificationChannel>,
        status: StatusHandle,
    ) -> Self {
        Self {
            store,
            channel,
            status,
            in_flight: JoinSet::new(),
        }
    }

    /// Drain the completed-item queue until stopped or the queue closes.
    pub async fn run(mut self, mut rx: UnboundedReceiver<Item>, mut stop: StopSignal) -> Result<()> {
        while !stop.is_stopped() {
            self.status.waiting();
            let next = tokio::select! {
                _ = stop.stopped() => None,
                item = rx.recv() => item,
            };
            let Some(item) = next else { break };

            self.status.work_depth(rx.len());
            self.dispatch(&item).await;
            while self.in_flight.try_join_next().is_some() {}
        }

        let aborted = drain_within(&mut self.in_flight, SHUTDOWN_GRACE).await;
        if aborted > 0 {
            warn!(target: "dispatch", aborted, "deliveries still running at stop were abandoned");
        }
        self.status.stopped();
        Ok(())
    }

    /// Evaluate `item` against every subscriber, reading each config fresh,
    /// and hand matches to the channel. Returns the notified subscribers.
    pub async fn dispatch(&mut self, item: &Item) -> Vec<SubscriberId> {
        let ids = match self.store.list_subscriber_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(target: "dispatch", url = %item.url, "listing subscribers failed: {e:#}");
                return Vec::new();
            }
        };

        let mut notified = Vec::new();
        for id in ids {
            let cfg = match self.store.get(id).await {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(target: "dispatch", subscriber = id, "reading config failed: {e:#}");
                    continue;
                }
            };
            if !cfg.online {
                continue;
            }
            if let Err(reason) = filter::evaluate(item, &cfg) {
                debug!(target: "dispatch", subscriber = id, url = %item.url, ?reason, "filtered out");
                continue;
            }

            counter!("dispatch_matched_total").increment(1);
            self.deliver(id, item);
            notified.push(id);
        }
        notified
    }

    fn deliver(&mut self, subscriber: SubscriberId, item: &Item) {
        let channel = self.channel.clone();
        let payload = format_item(item);
        let url = item.url.clone();
        self.in_flight.spawn(async move {
            if let DeliveryOutcome::DeliveryFailed(reason) = channel.send(subscriber, &payload).await {
                counter!("dispatch_delivery_errors_total").increment(1);
                warn!(target: "dispatch", subscriber, %url, %reason, "delivery failed");
            }
        });
    }

    /// Wait for every delivery handed out so far.
    pub async fn flush(&mut self) {
        while self.in_flight.join_next().await.is_some() {}
    }
}
