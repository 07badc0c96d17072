use std::sync::Arc;
use std::time::Duration;

use common::logger::{symbol_span, warn_if_slow};
use futures::future::join_all;
use market::CandleSource;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info};

use super::processor::SymbolProcessor;
use crate::delivery::QueueSender;
use crate::metrics::Counters;

const SLOW_SYMBOL: Duration = Duration::from_secs(30);

/// Runs one task per symbol under a shared concurrency gate, then signals
/// the delivery pool to shut down.
///
/// A task that errors or panics is logged and counted; it never takes its
/// siblings down. One `Stop` per worker is queued once every task has
/// joined, so workers drain all accepted messages first.
pub async fn run_fan_out<S: CandleSource>(
    symbols: Vec<String>,
    processor: Arc<SymbolProcessor<S>>,
    max_concurrent: usize,
    workers: usize,
    queue: QueueSender,
    counters: Counters,
) {
    let gate = Arc::new(Semaphore::new(max_concurrent.max(1)));
    info!(symbols = symbols.len(), max_concurrent, "fan-out started");

    let handles: Vec<_> = symbols
        .into_iter()
        .map(|symbol| {
            let gate = gate.clone();
            let processor = processor.clone();
            let span = symbol_span(&symbol);

            tokio::spawn(
                async move {
                    let Ok(_permit) = gate.acquire_owned().await else {
                        return Ok(());
                    };
                    // `process` checks the quota latch first thing.
                    warn_if_slow("process_symbol", SLOW_SYMBOL, processor.process(&symbol)).await
                }
                .instrument(span),
            )
        })
        .collect();

    for res in join_all(handles).await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                Counters::incr(&counters.symbols_failed);
                error!(error = ?e, "symbol task failed");
            }
            Err(e) => {
                Counters::incr(&counters.symbols_failed);
                error!(error = %e, "symbol task panicked");
            }
        }
    }

    if let Err(e) = queue.close(workers) {
        error!(error = %e, "could not signal delivery workers to stop");
    }
    debug!(workers, "stop sentinels queued");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{DeliveryItem, delivery_queue};
    use crate::quota::QuotaGuard;
    use async_trait::async_trait;
    use market::indicators::{IndicatorParams, Thresholds};
    use market::{Candle, CandleFetcher, FetchError, FetchRetryPolicy, Interval};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Same falling series for every symbol; `PANIC` blows up.
    struct Falling {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CandleSource for Falling {
        async fn fetch_candles(
            &self,
            symbol: &str,
            _interval: Interval,
            limit: usize,
        ) -> Result<Vec<Candle>, FetchError> {
            assert_ne!(symbol, "PANIC", "scripted panic");
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok((0..limit)
                .map(|i| {
                    let close = 100.0 - i as f64;
                    Candle {
                        open_time: i as i64,
                        open: close,
                        high: close + 1.0,
                        low: close,
                        close,
                        volume: 1.0,
                    }
                })
                .collect())
        }
    }

    fn setup(
        cap: usize,
    ) -> (
        Arc<SymbolProcessor<Falling>>,
        Arc<Falling>,
        QueueSender,
        crate::delivery::QueueReceiver,
        Counters,
    ) {
        let source = Arc::new(Falling {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let fetcher = Arc::new(CandleFetcher::new(source.clone(), FetchRetryPolicy::default()));
        let (tx, rx) = delivery_queue();
        let counters = Counters::default();
        let processor = Arc::new(SymbolProcessor::new(
            fetcher,
            Arc::from(vec![Interval::from_minutes(5).unwrap()]),
            IndicatorParams::default(),
            Thresholds::default(),
            Arc::new(QuotaGuard::new(cap)),
            tx.clone(),
            counters.clone(),
        ));
        (processor, source, tx, rx, counters)
    }

    async fn drain(rx: &crate::delivery::QueueReceiver) -> (usize, usize) {
        let (mut messages, mut stops) = (0, 0);
        while let Some(item) = rx.next().await {
            match item {
                DeliveryItem::Message(_) => messages += 1,
                DeliveryItem::Stop => {
                    stops += 1;
                    if stops == 3 {
                        break;
                    }
                }
            }
        }
        (messages, stops)
    }

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SYM{i}USDT")).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn quota_caps_enqueued_messages() {
        let (processor, _, tx, rx, counters) = setup(2);

        run_fan_out(symbols(5), processor.clone(), 50, 3, tx, counters.clone()).await;

        assert_eq!(drain(&rx).await, (2, 3));
        assert!(processor.quota().is_limit_reached());
        assert_eq!(counters.snapshot().messages_enqueued, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gate_bounds_concurrent_fetches() {
        let (processor, source, tx, rx, _) = setup(100);

        run_fan_out(symbols(20), processor, 3, 3, tx, Counters::default()).await;

        assert_eq!(drain(&rx).await, (20, 3));
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn latched_quota_counts_every_skipped_symbol() {
        let (processor, source, tx, rx, counters) = setup(0);

        run_fan_out(symbols(4), processor, 2, 3, tx, counters.clone()).await;

        assert_eq!(drain(&rx).await, (0, 3));
        let snap = counters.snapshot();
        assert_eq!(snap.symbols_skipped, 4);
        assert_eq!(snap.symbols_processed, 0);
        assert_eq!(source.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_task_is_isolated() {
        let (processor, _, tx, rx, counters) = setup(10);
        let mut list = symbols(2);
        list.insert(1, "PANIC".into());

        run_fan_out(list, processor, 50, 3, tx, counters.clone()).await;

        assert_eq!(drain(&rx).await, (2, 3));
        assert_eq!(counters.snapshot().symbols_failed, 1);
    }
}
