use parking_lot::Mutex;

use super::{DeliveryOutcome, NotificationChannel, Payload};
use crate::subscribers::SubscriberId;

/// Channel used when no bot token is configured: deliveries are only logged.
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait::async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, subscriber: SubscriberId, payload: &Payload) -> DeliveryOutcome {
        tracing::info!(target: "notify", subscriber, text = %payload.text, "notification (log only)");
        DeliveryOutcome::Delivered
    }
}

/// Keeps every delivery in memory. Subscribers listed in `failing` get
/// `DeliveryFailed` instead.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(SubscriberId, Payload)>>,
    failing: Mutex<Vec<SubscriberId>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, subscriber: SubscriberId) {
        self.failing.lock().push(subscriber);
    }

    pub fn sent(&self) -> Vec<(SubscriberId, Payload)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, subscriber: SubscriberId) -> Vec<Payload> {
        self.sent
            .lock()
            .iter()
            .filter(|(s, _)| *s == subscriber)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, subscriber: SubscriberId, payload: &Payload) -> DeliveryOutcome {
        if self.failing.lock().contains(&subscriber) {
            return DeliveryOutcome::DeliveryFailed("recording channel told to fail".into());
        }
        self.sent.lock().push((subscriber, payload.clone()));
        DeliveryOutcome::Delivered
    }
}
