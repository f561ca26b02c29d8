use crate::output::{OutputChannel, TailSnapshot};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Fixed-interval reader publishing the output tail whenever it changes.
pub struct TailPoller {
    channel: Arc<OutputChannel>,
    max_bytes: usize,
    last_observed: TailSnapshot,
    publisher: watch::Sender<TailSnapshot>,
}

impl TailPoller {
    pub fn new(
        channel: Arc<OutputChannel>,
        max_bytes: usize,
        publisher: watch::Sender<TailSnapshot>,
    ) -> Self {
        Self {
            channel,
            max_bytes,
            last_observed: TailSnapshot::default(),
            publisher,
        }
    }

    /// Read the tail once. Returns `true` if text or epoch differed from the previous read
    /// and was published.
    ///
    /// A failed read counts as empty output.
    pub async fn poll_once(&mut self) -> bool {
        let current = match self.channel.tail_snapshot(self.max_bytes).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Treating unreadable output as empty: {e}");
                TailSnapshot {
                    epoch: self.channel.epoch(),
                    text: String::new(),
                }
            }
        };

        if current == self.last_observed {
            return false;
        }

        self.last_observed = current.clone();
        self.publisher.send_replace(current);
        true
    }
}

/// Run a [`TailPoller`] every `period` until `cancel` fires.
pub fn spawn_tail_poller(
    mut poller: TailPoller,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("Output tail poller started ({period:?})");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    poller.poll_once().await;
                }
            }
        }

        debug!("Output tail poller stopped");
    })
}
