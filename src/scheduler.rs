/*!
 * Async Delivery Scheduler
 * One spawned task per delivery: sleep for the resolved delay, send once,
 * log the outcome. No retries.
 */

use crate::delivery::{Destination, Outbound};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct DeliveryScheduler {
    outbound: Arc<dyn Outbound>,
}

/// Handle to a scheduled delivery. Dropping it leaves the delivery running.
pub struct DeliveryHandle {
    task: JoinHandle<()>,
}

impl DeliveryHandle {
    /// Abort the delivery if it has not been sent yet.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the delivery was attempted or cancelled.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

impl DeliveryScheduler {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self { outbound }
    }

    /// Deliver `payload` to `destination` after `delay_secs`; returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, payload: Value, delay_secs: u64, destination: Destination) -> DeliveryHandle {
        let outbound = Arc::clone(&self.outbound);
        info!(%destination, delay_secs, "Adding timed delivery");

        let task = tokio::spawn(async move {
            if delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }

            match outbound.send(&destination, &payload).await {
                Ok(()) => info!(%destination, "Scheduled delivery completed"),
                Err(e) => error!(%destination, error = %e, "Scheduled delivery failed"),
            }
        });

        DeliveryHandle { task }
    }
}
