use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

/// Alert text for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub symbol: String,
    pub text: String,
}

/// Queue item. `Stop` tells exactly one worker to exit.
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryItem {
    Message(OutboundMessage),
    Stop,
}

#[derive(Debug, thiserror::Error)]
#[error("delivery queue closed")]
pub struct QueueClosed;

/// Producer handle, cloned into every symbol task.
#[derive(Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<DeliveryItem>,
}

impl QueueSender {
    pub fn enqueue(&self, message: OutboundMessage) -> Result<(), QueueClosed> {
        self.tx
            .send(DeliveryItem::Message(message))
            .map_err(|_| QueueClosed)
    }

    /// Enqueues one `Stop` per worker. Sentinels queue behind every message
    /// already sent, so workers drain the backlog first.
    pub fn close(&self, workers: usize) -> Result<(), QueueClosed> {
        for _ in 0..workers {
            self.tx.send(DeliveryItem::Stop).map_err(|_| QueueClosed)?;
        }
        Ok(())
    }
}

/// Consumer handle shared by all workers. Items are handed out FIFO, each
/// to exactly one worker.
#[derive(Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<DeliveryItem>>>,
}

impl QueueReceiver {
    /// Waits for the next item. `None` once every sender is gone and the
    /// queue is empty.
    pub async fn next(&self) -> Option<DeliveryItem> {
        self.rx.lock().await.recv().await
    }
}

pub fn delivery_queue() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        QueueSender { tx },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}
