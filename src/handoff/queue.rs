//! Queued dispatch: bounded in-process queue plus a delivery worker.
//!
//! `dispatch` acknowledges once the payload is accepted. The worker delivers
//! each payload on its own task and retries transport failures and 5xx
//! responses with exponential backoff. Nothing survives a restart.
//!
//! `capacity` bounds queued and in-flight deliveries together: a slot is
//! taken at dispatch and released only when delivery finishes or gives up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{HandoffDispatcher, HandoffPayload, post_payload};
use crate::error::HandoffError;

/// One queued handoff.
#[derive(Debug)]
pub struct Delivery {
    pub url: String,
    pub payload: HandoffPayload,
}

/// A delivery holding its queue slot.
#[derive(Debug)]
pub struct QueuedDelivery {
    delivery: Delivery,
    slot: OwnedSemaphorePermit,
}

/// Retry settings for the delivery worker.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Enqueues payloads for the delivery worker.
pub struct QueuedDispatcher {
    tx: mpsc::Sender<QueuedDelivery>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl QueuedDispatcher {
    /// Create the dispatcher and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<QueuedDelivery>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let slots = Arc::new(Semaphore::new(capacity));
        (
            Self {
                tx,
                slots,
                capacity,
            },
            rx,
        )
    }

    /// Slots currently free for new payloads.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

#[async_trait]
impl HandoffDispatcher for QueuedDispatcher {
    async fn dispatch(&self, agent_url: &str, payload: HandoffPayload) -> Result<(), HandoffError> {
        if self.tx.is_closed() {
            return Err(HandoffError::QueueClosed);
        }
        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|e| match e {
                TryAcquireError::NoPermits => HandoffError::QueueFull {
                    capacity: self.capacity,
                },
                TryAcquireError::Closed => HandoffError::QueueClosed,
            })?;

        let queued = QueuedDelivery {
            delivery: Delivery {
                url: agent_url.to_string(),
                payload,
            },
            slot,
        };
        // Channel size equals slot count: only a stopped worker refuses here.
        self.tx.try_send(queued).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HandoffError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => HandoffError::QueueClosed,
        })
    }
}

/// Drain the queue until every sender is dropped.
pub fn spawn_delivery_worker(
    mut rx: mpsc::Receiver<QueuedDelivery>,
    client: reqwest::Client,
    policy: RetryPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Handoff delivery worker started");
        while let Some(queued) = rx.recv().await {
            let client = client.clone();
            tokio::spawn(async move {
                let QueuedDelivery { delivery, slot } = queued;
                let user_id = delivery.payload.user.id.clone();
                match deliver(&client, &delivery, policy).await {
                    Ok(attempts) => debug!(user_id = %user_id, attempts, "Handoff delivered"),
                    Err(e) => warn!(user_id = %user_id, error = %e, "Handoff delivery gave up"),
                }
                drop(slot);
            });
        }
        info!("Handoff delivery worker stopped");
    })
}

/// Deliver one payload, returning the number of attempts used.
pub async fn deliver(
    client: &reqwest::Client,
    delivery: &Delivery,
    policy: RetryPolicy,
) -> Result<u32, HandoffError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match post_payload(client, &delivery.url, &delivery.payload).await {
            Ok(status) if status.is_server_error() => HandoffError::Status(status.as_u16()),
            Ok(status) if status.is_success() => return Ok(attempt),
            // 4xx will not improve with retries.
            Ok(status) => return Err(HandoffError::Status(status.as_u16())),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(error);
        }
        let delay = policy.backoff(attempt);
        debug!(attempt, ?delay, error = %error, "Retrying handoff");
        tokio::time::sleep(delay).await;
    }
}
