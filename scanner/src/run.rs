//! One scan run, start to finish.
//!
//! Flow:
//! 1. schedule gate (no-op when no interval aligns with `now`)
//! 2. instrument list, minus the denylist
//! 3. delivery pool start
//! 4. fan-out over every instrument
//! 5. pool shutdown once the queue is drained
//!
//! Every collaborator is injected through a trait so the whole flow can be
//! driven against in-memory sources in tests.

use std::sync::Arc;

use chrono::Timelike;
use common::logger::{TraceId, run_span};
use market::{CandleFetcher, CandleSource, InstrumentSource, Interval};
use tracing::{Instrument, info, warn};

use crate::config::AppConfig;
use crate::delivery::{DeliveryChannel, DeliveryPool, delivery_queue, send_with_retry};
use crate::metrics::{Counters, CountersSnapshot};
use crate::pipeline::{SymbolProcessor, run_fan_out};
use crate::quota::QuotaGuard;
use crate::schedule::active_intervals;

pub const EMPTY_INSTRUMENTS_NOTICE: &str = "❌ Instrument list is empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No configured interval aligned with the clock.
    NotScheduled,
    /// The instrument source returned nothing to scan.
    NoInstruments,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub trace_id: String,
    pub outcome: RunOutcome,
    pub intervals: Vec<Interval>,
    pub instruments: usize,
    pub limit_reached: bool,
    pub counters: CountersSnapshot,
}

/// Wires the collaborators for one run.
pub struct Scanner<I, S, D> {
    cfg: AppConfig,
    instruments: Arc<I>,
    candles: Arc<S>,
    channel: Arc<D>,
}

impl<I, S, D> Scanner<I, S, D>
where
    I: InstrumentSource,
    S: CandleSource,
    D: DeliveryChannel,
{
    pub fn new(cfg: AppConfig, instruments: Arc<I>, candles: Arc<S>, channel: Arc<D>) -> Self {
        Self {
            cfg,
            instruments,
            candles,
            channel,
        }
    }

    pub async fn run<T: Timelike>(&self, now: &T) -> anyhow::Result<RunSummary> {
        let trace_id = TraceId::default();
        let span = run_span(&trace_id, self.cfg.manual_run);
        let intervals = active_intervals(&self.cfg.intervals, self.cfg.manual_run, now);

        self.run_inner(trace_id, intervals).instrument(span).await
    }

    async fn run_inner(
        &self,
        trace_id: TraceId,
        intervals: Vec<Interval>,
    ) -> anyhow::Result<RunSummary> {
        let counters = Counters::default();
        let mut summary = RunSummary {
            trace_id: trace_id.to_string(),
            outcome: RunOutcome::NotScheduled,
            intervals: intervals.clone(),
            instruments: 0,
            limit_reached: false,
            counters: counters.snapshot(),
        };

        if intervals.is_empty() {
            info!("no interval aligned with the current minute, nothing to do");
            return Ok(summary);
        }
        info!(intervals = ?intervals, "run started");

        let symbols = self.load_instruments().await;
        tracing::Span::current().record("instruments", symbols.len());
        summary.instruments = symbols.len();

        if symbols.is_empty() {
            warn!("instrument list is empty");
            summary.outcome = RunOutcome::NoInstruments;
            if self.cfg.notify_empty_instruments {
                let outcome = send_with_retry(
                    self.channel.as_ref(),
                    EMPTY_INSTRUMENTS_NOTICE,
                    &self.cfg.send_retry,
                )
                .await;
                info!(delivered = outcome.is_delivered(), "empty instrument notice sent");
            }
            return Ok(summary);
        }

        let quota = Arc::new(QuotaGuard::new(self.cfg.message_limit));
        let (tx, rx) = delivery_queue();

        let pool = DeliveryPool::spawn(
            self.channel.clone(),
            rx,
            self.cfg.delivery_workers,
            self.cfg.max_concurrent_sends,
            self.cfg.send_retry,
            counters.clone(),
        );

        let fetcher = Arc::new(CandleFetcher::new(self.candles.clone(), self.cfg.fetch_retry));
        let processor = Arc::new(SymbolProcessor::new(
            fetcher,
            Arc::from(intervals),
            self.cfg.indicator_params,
            self.cfg.thresholds,
            quota.clone(),
            tx.clone(),
            counters.clone(),
        ));

        run_fan_out(
            symbols,
            processor,
            self.cfg.max_concurrent_tasks,
            pool.len(),
            tx,
            counters.clone(),
        )
        .await;

        pool.join().await;

        summary.outcome = RunOutcome::Completed;
        summary.limit_reached = quota.is_limit_reached();
        summary.counters = counters.snapshot();

        info!(
            instruments = summary.instruments,
            signals = summary.counters.signals,
            enqueued = summary.counters.messages_enqueued,
            discarded = summary.counters.messages_discarded,
            delivered = summary.counters.messages_delivered,
            undeliverable = summary.counters.messages_undeliverable,
            limit_reached = summary.limit_reached,
            "run finished"
        );

        Ok(summary)
    }

    /// Fetch failures count as an empty universe.
    async fn load_instruments(&self) -> Vec<String> {
        let symbols = match self.instruments.fetch_instruments().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "could not load instrument list");
                return Vec::new();
            }
        };

        let total = symbols.len();
        let kept: Vec<String> = symbols
            .into_iter()
            .filter(|s| !self.cfg.is_excluded(s))
            .collect();

        info!(total, kept = kept.len(), "instrument list loaded");
        kept
    }
}
