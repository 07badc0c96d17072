use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::errors::FetchError;
use crate::types::{Candle, Interval};

/// Source of the instrument universe.
#[async_trait]
pub trait InstrumentSource: Send + Sync + 'static {
    async fn fetch_instruments(&self) -> Result<Vec<String>, FetchError>;
}

/// Source of kline data. Implementations return candles oldest first,
/// including the still-forming newest bar.
#[async_trait]
pub trait CandleSource: Send + Sync + 'static {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchRetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for FetchRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Retrying wrapper around a [`CandleSource`].
///
/// Never fails: every error path ends in a log line and `None`, which
/// callers treat as "skip this interval".
pub struct CandleFetcher<S> {
    source: Arc<S>,
    policy: FetchRetryPolicy,
}

impl<S: CandleSource> CandleFetcher<S> {
    pub fn new(source: Arc<S>, policy: FetchRetryPolicy) -> Self {
        Self { source, policy }
    }

    pub async fn fetch(&self, symbol: &str, interval: Interval, limit: usize) -> Option<Vec<Candle>> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let err = match self.source.fetch_candles(symbol, interval, limit).await {
                Ok(candles) if candles.is_empty() => {
                    warn!(%symbol, %interval, attempt, "empty candle list");
                    return None;
                }
                Ok(candles) => return Some(candles),
                Err(e) => e,
            };

            match err {
                FetchError::Api { code, message } => {
                    error!(%symbol, %interval, attempt, code, %message, "candle request rejected");
                    return None;
                }
                e if !e.is_retryable() => {
                    error!(%symbol, %interval, attempt, error = %e, "candle fetch failed, not retrying");
                    return None;
                }
                e if attempt < max_attempts => {
                    warn!(
                        %symbol,
                        %interval,
                        attempt,
                        max_attempts,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        error = %e,
                        "candle fetch failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                e => {
                    error!(%symbol, %interval, attempt, error = %e, "candle fetch retries exhausted");
                }
            }
        }

        None
    }
}
