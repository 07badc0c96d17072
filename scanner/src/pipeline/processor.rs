use std::sync::Arc;

use anyhow::Context;
use market::indicators::{IndicatorParams, Thresholds, analyze};
use market::{CandleFetcher, CandleSource, Interval};
use tracing::{debug, info, warn};

use super::message::SignalSet;
use crate::delivery::{OutboundMessage, QueueSender};
use crate::metrics::Counters;
use crate::quota::QuotaGuard;

/// Per-instrument unit of work.
///
/// Intervals are processed sequentially in configured order. The quota
/// latch is checked before the instrument starts and before each interval;
/// in-flight fetches are allowed to finish.
pub struct SymbolProcessor<S> {
    fetcher: Arc<CandleFetcher<S>>,
    intervals: Arc<[Interval]>,
    params: IndicatorParams,
    thresholds: Thresholds,
    quota: Arc<QuotaGuard>,
    queue: QueueSender,
    counters: Counters,
}

impl<S: CandleSource> SymbolProcessor<S> {
    pub fn new(
        fetcher: Arc<CandleFetcher<S>>,
        intervals: Arc<[Interval]>,
        params: IndicatorParams,
        thresholds: Thresholds,
        quota: Arc<QuotaGuard>,
        queue: QueueSender,
        counters: Counters,
    ) -> Self {
        Self {
            fetcher,
            intervals,
            params,
            thresholds,
            quota,
            queue,
            counters,
        }
    }

    pub fn quota(&self) -> &QuotaGuard {
        &self.quota
    }

    pub async fn process(&self, symbol: &str) -> anyhow::Result<()> {
        if self.quota.is_limit_reached() {
            Counters::incr(&self.counters.symbols_skipped);
            debug!(%symbol, "message limit reached, skipping instrument");
            return Ok(());
        }

        // One extra so the forming bar can be dropped.
        let limit = self.params.required_candles() + 1;
        let mut signals = SignalSet::default();

        for &interval in self.intervals.iter() {
            if self.quota.is_limit_reached() {
                debug!(%symbol, %interval, "message limit reached, abandoning instrument");
                Counters::incr(&self.counters.symbols_skipped);
                return Ok(());
            }

            let Some(mut candles) = self.fetcher.fetch(symbol, interval, limit).await else {
                Counters::incr(&self.counters.intervals_no_data);
                warn!(%symbol, %interval, "no candle data, skipping interval");
                continue;
            };
            candles.pop();

            let result = analyze(&candles, &self.params, &self.thresholds);

            let Some((k, d, macd)) = result.signal_values() else {
                info!(%symbol, %interval, candles = candles.len(), "insufficient data for indicators");
                continue;
            };

            info!(
                %symbol,
                %interval,
                percent_k = k,
                percent_d = d,
                macd,
                direction = ?result.direction,
                "indicators computed"
            );

            if result.direction.is_signal() && k.is_finite() && d.is_finite() && macd.is_finite() {
                signals.record(interval, result.direction, k, d, macd);
            }
        }

        Counters::incr(&self.counters.symbols_processed);

        let Some(text) = signals.compose(symbol) else {
            return Ok(());
        };
        Counters::incr(&self.counters.signals);

        if !self.quota.try_reserve() {
            Counters::incr(&self.counters.messages_discarded);
            info!(%symbol, "message limit reached, discarding signal");
            return Ok(());
        }

        self.queue
            .enqueue(OutboundMessage {
                symbol: symbol.to_string(),
                text,
            })
            .with_context(|| format!("enqueue alert for {symbol}"))?;
        Counters::incr(&self.counters.messages_enqueued);
        info!(%symbol, intervals = ?signals.labels(), "signal queued for delivery");

        Ok(())
    }
}
