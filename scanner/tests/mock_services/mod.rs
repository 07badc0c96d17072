//! In-memory collaborators for driving full runs.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use market::{Candle, CandleSource, FetchError, InstrumentSource, Interval};
use parking_lot::Mutex;
use scanner::config::AppConfig;
use scanner::delivery::{DeliveryChannel, SendError};

pub struct StaticInstruments {
    symbols: Option<Vec<String>>,
}

impl StaticInstruments {
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: Some(symbols.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self { symbols: None }
    }
}

#[async_trait]
impl InstrumentSource for StaticInstruments {
    async fn fetch_instruments(&self) -> Result<Vec<String>, FetchError> {
        self.symbols.clone().ok_or(FetchError::Timeout)
    }
}

/// Falling market closing on its lows for symbols in `oversold`; a flat
/// market closing mid-range for the rest.
/// Serves `limit` bars unless pinned with [`SyntheticMarket::serving`];
/// the newest bar plays the forming one.
pub struct SyntheticMarket {
    oversold: HashSet<String>,
    bars: Option<usize>,
    pub calls: AtomicUsize,
}

impl SyntheticMarket {
    pub fn new(oversold: &[&str]) -> Self {
        Self {
            oversold: oversold.iter().map(|s| s.to_string()).collect(),
            bars: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns `bars` bars, whatever the request limit.
    pub fn serving(mut self, bars: usize) -> Self {
        self.bars = Some(bars);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleSource for SyntheticMarket {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (step, wick) = if self.oversold.contains(symbol) {
            (-1.0, 0.0)
        } else {
            (0.0, 1.0)
        };
        let bar_ms = interval.minutes() as i64 * 60_000;

        Ok((0..self.bars.unwrap_or(limit))
            .map(|i| {
                let close = 100.0 + step * i as f64;
                Candle {
                    open_time: i as i64 * bar_ms,
                    open: close,
                    high: close + 1.0,
                    low: close - wick,
                    close,
                    volume: 5.0,
                }
            })
            .collect())
    }
}

/// Records every accepted text.
#[derive(Default)]
pub struct RecordingChannel {
    pub delivered: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
}

impl RecordingChannel {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.delivered.lock().push(text.to_string());
        Ok(())
    }
}

pub fn config(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars = vec![
        ("BOT_TOKEN", "123:abc"),
        ("CHAT_ID", "-100"),
        ("MANUAL_RUN", "true"),
        ("INTERVALS", "5"),
    ];
    vars.extend_from_slice(overrides);

    AppConfig::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("test config")
}
