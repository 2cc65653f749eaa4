// src/stop.rs
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// How long a stopping unit waits for its outstanding sends.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Sending half of the cooperative cancellation flag.
#[derive(Debug)]
pub struct StopTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every unit.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

pub fn stop_pair() -> (StopTrigger, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopTrigger { tx }, StopSignal { rx })
}

impl StopTrigger {
    pub fn stop(&self) {
        // send_replace never fails, even with no receivers left
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested (or the trigger is gone).
    pub async fn stopped(&mut self) {
        if self.is_stopped() {
            return;
        }
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    /// Sleep for `dur` unless stopped first. Returns `true` when stopped.
    pub async fn sleep(&mut self, dur: Duration) -> bool {
        let interrupted = tokio::select! {
            _ = self.stopped() => true,
            _ = tokio::time::sleep(dur) => false,
        };
        interrupted || self.is_stopped()
    }

    /// Sleep `secs` whole seconds, one slice at a time, calling `tick` with
    /// the seconds left before each slice. Returns `true` when stopped.
    pub async fn sleep_secs<F: FnMut(u64)>(&mut self, secs: u64, mut tick: F) -> bool {
        for left in (1..=secs).rev() {
            tick(left);
            if self.sleep(Duration::from_secs(1)).await {
                return true;
            }
        }
        self.is_stopped()
    }
}

/// Wait up to `grace` for every task in `set`, then abort the rest.
/// Returns how many tasks were aborted.
pub async fn drain_within<T: 'static>(set: &mut JoinSet<T>, grace: Duration) -> usize {
    let drained = tokio::time::timeout(grace, async {
        while set.join_next().await.is_some() {}
    })
    .await;
    if drained.is_ok() {
        return 0;
    }
    let left = set.len();
    set.shutdown().await;
    left
}
