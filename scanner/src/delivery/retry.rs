use std::time::Duration;

use tracing::{debug, error, warn};

use super::{DeliveryChannel, SendError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SendRetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// First exponential backoff delay.
    pub initial_delay: Duration,
    /// Multiplier applied after every backoff sleep.
    pub backoff_factor: f64,
}

impl Default for SendRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered { attempts: u32 },
    Undeliverable { attempts: u32, last_error: SendError },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Wait computation shared by every failure kind.
///
/// Server-requested waits are taken verbatim and leave the exponential
/// sequence untouched; timeouts and transient errors advance it.
struct Backoff<'a> {
    policy: &'a SendRetryPolicy,
    steps: i32,
}

impl Backoff<'_> {
    /// `None` means the error is final.
    fn next_wait(&mut self, err: &SendError) -> Option<Duration> {
        match err {
            SendError::Fatal(_) => None,
            SendError::RetryAfter(wait) => Some(*wait),
            SendError::Timeout | SendError::Transient(_) => {
                let wait = self
                    .policy
                    .initial_delay
                    .mul_f64(self.policy.backoff_factor.powi(self.steps));
                self.steps += 1;
                Some(wait)
            }
        }
    }
}

/// Sends `text` through `channel`, retrying per `policy`.
///
/// The original text is escaped afresh on every attempt. There is no sleep
/// after the final attempt and the message is never re-queued.
pub async fn send_with_retry<D>(channel: &D, text: &str, policy: &SendRetryPolicy) -> SendOutcome
where
    D: DeliveryChannel + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = Backoff { policy, steps: 0 };
    let mut attempt = 1;

    loop {
        let escaped = channel.escape(text);

        let err = match channel.send(&escaped).await {
            Ok(()) => {
                debug!(attempt, "message sent");
                return SendOutcome::Delivered { attempts: attempt };
            }
            Err(e) => e,
        };

        let Some(wait) = backoff.next_wait(&err) else {
            error!(attempt, max_attempts, error = %err, "send rejected, not retrying");
            return SendOutcome::Undeliverable {
                attempts: attempt,
                last_error: err,
            };
        };

        if attempt >= max_attempts {
            error!(attempt, max_attempts, error = %err, "send attempts exhausted");
            return SendOutcome::Undeliverable {
                attempts: attempt,
                last_error: err,
            };
        }

        warn!(
            attempt,
            max_attempts,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "send failed, retrying"
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
