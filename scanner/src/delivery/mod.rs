//! Outbound side of the pipeline: the queue between symbol tasks and the
//! worker pool, the retry driver, and the Telegram channel.

pub mod queue;
pub mod retry;
pub mod telegram;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use queue::{DeliveryItem, OutboundMessage, QueueReceiver, QueueSender, delivery_queue};
pub use retry::{SendOutcome, SendRetryPolicy, send_with_retry};
pub use worker::DeliveryPool;

/// Closed set of send failures. The retry driver picks its wait from the
/// variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Server-side flood control with an explicit wait.
    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),

    #[error("request timed out")]
    Timeout,

    #[error("channel error: {0}")]
    Transient(String),

    /// Retrying cannot help (bad token, unknown chat).
    #[error("rejected by channel: {0}")]
    Fatal(String),
}

/// Abstraction over the messaging endpoint.
#[async_trait]
pub trait DeliveryChannel: Send + Sync + 'static {
    /// Sends text that has already been through [`DeliveryChannel::escape`].
    async fn send(&self, text: &str) -> Result<(), SendError>;

    /// Escapes plain text for the channel's markup. Identity by default.
    fn escape(&self, text: &str) -> String {
        text.to_string()
    }
}
