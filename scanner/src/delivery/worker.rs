//! Delivery worker pool.
//!
//! A fixed number of workers pull from the shared queue. Each item goes to
//! exactly one worker. A worker exits on its `Stop` sentinel, or when every
//! sender is gone and the queue is empty. Actual sends are additionally
//! gated by a semaphore so the pool size and the number of in-flight HTTP
//! calls can be tuned separately.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::queue::{DeliveryItem, QueueReceiver};
use super::retry::{SendOutcome, SendRetryPolicy, send_with_retry};
use super::DeliveryChannel;
use crate::metrics::Counters;

struct DeliveryWorker<D: DeliveryChannel> {
    id: usize,
    channel: Arc<D>,
    send_gate: Arc<Semaphore>,
    policy: SendRetryPolicy,
    counters: Counters,
}

impl<D: DeliveryChannel> DeliveryWorker<D> {
    async fn run(self, rx: QueueReceiver) {
        debug!(worker = self.id, "delivery worker started");

        loop {
            let message = match rx.next().await {
                Some(DeliveryItem::Message(m)) => m,
                Some(DeliveryItem::Stop) => {
                    debug!(worker = self.id, "stop sentinel received");
                    break;
                }
                None => {
                    warn!(worker = self.id, "queue closed without stop sentinel");
                    break;
                }
            };

            // Closed only if the pool is torn down mid-run.
            let Ok(_permit) = self.send_gate.acquire().await else {
                error!(worker = self.id, "send gate closed; dropping message");
                Counters::incr(&self.counters.messages_undeliverable);
                continue;
            };

            match send_with_retry(self.channel.as_ref(), &message.text, &self.policy).await {
                SendOutcome::Delivered { attempts } => {
                    Counters::incr(&self.counters.messages_delivered);
                    info!(
                        worker = self.id,
                        symbol = %message.symbol,
                        attempts,
                        "alert delivered"
                    );
                }
                SendOutcome::Undeliverable {
                    attempts,
                    last_error,
                } => {
                    Counters::incr(&self.counters.messages_undeliverable);
                    error!(
                        worker = self.id,
                        symbol = %message.symbol,
                        attempts,
                        error = %last_error,
                        "alert undeliverable, dropping"
                    );
                }
            }
        }

        debug!(worker = self.id, "delivery worker exiting");
    }
}

/// Handle over the spawned workers.
pub struct DeliveryPool {
    handles: Vec<JoinHandle<()>>,
}

impl DeliveryPool {
    /// Spawns `workers` workers (at least one) reading from `rx`.
    pub fn spawn<D: DeliveryChannel>(
        channel: Arc<D>,
        rx: QueueReceiver,
        workers: usize,
        max_concurrent_sends: usize,
        policy: SendRetryPolicy,
        counters: Counters,
    ) -> Self {
        let send_gate = Arc::new(Semaphore::new(max_concurrent_sends.max(1)));

        let handles = (0..workers.max(1))
            .map(|id| {
                let worker = DeliveryWorker {
                    id,
                    channel: channel.clone(),
                    send_gate: send_gate.clone(),
                    policy,
                    counters: counters.clone(),
                };
                let rx = rx.clone();
                tokio::spawn(
                    async move { worker.run(rx).await }
                        .instrument(info_span!("delivery_worker", worker = id)),
                )
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for res in join_all(self.handles).await {
            if let Err(e) = res {
                error!(error = %e, "delivery worker panicked");
            }
        }
    }
}
