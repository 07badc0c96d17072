//! Oscillator indicators and the signal rule built on top of them.
//!
//! Everything here is a pure function of an ordered candle slice
//! (oldest first). Callers must drop the still-forming candle before
//! calling in: the engine assumes every candle it sees is closed.

pub mod macd;
pub mod stochastic;

use crate::types::{Candle, Direction};

pub use macd::{Macd, ema, macd};
pub use stochastic::{Stochastic, stochastic};

/// Indicator periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub k_period: usize,
    pub d_period: usize,
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl IndicatorParams {
    /// Closed candles needed for both indicators to be defined.
    pub fn required_candles(&self) -> usize {
        (self.slow_period + self.signal_period).max(self.k_period + self.d_period.saturating_sub(1))
    }
}

/// Oversold / overbought bounds for the stochastic pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            oversold: 20.0,
            overbought: 80.0,
        }
    }
}

/// Indicator snapshot for one (instrument, interval) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorResult {
    pub percent_k: Option<f64>,
    pub percent_d: Option<f64>,
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
    pub direction: Direction,
}

impl IndicatorResult {
    /// %K, %D and MACD when all three are defined.
    pub fn signal_values(&self) -> Option<(f64, f64, f64)> {
        Some((self.percent_k?, self.percent_d?, self.macd?))
    }
}

/// Signal rule. MACD is not compared against anything; it only has to be
/// defined for a signal to fire.
pub fn classify(
    percent_k: Option<f64>,
    percent_d: Option<f64>,
    macd: Option<f64>,
    thresholds: &Thresholds,
) -> Direction {
    let (Some(k), Some(d), Some(_)) = (percent_k, percent_d, macd) else {
        return Direction::Neutral;
    };

    if k < thresholds.oversold && d < thresholds.oversold {
        Direction::Long
    } else if k > thresholds.overbought && d > thresholds.overbought {
        Direction::Short
    } else {
        Direction::Neutral
    }
}

/// Runs both indicators and classifies the result.
pub fn analyze(
    candles: &[Candle],
    params: &IndicatorParams,
    thresholds: &Thresholds,
) -> IndicatorResult {
    let stoch = stochastic(candles, params.k_period, params.d_period);
    let m = macd(
        candles,
        params.fast_period,
        params.slow_period,
        params.signal_period,
    );

    let percent_k = stoch.map(|s| s.percent_k);
    let percent_d = stoch.map(|s| s.percent_d);

    IndicatorResult {
        percent_k,
        percent_d,
        macd: m.macd,
        signal: m.signal,
        histogram: m.histogram,
        direction: classify(percent_k, percent_d, m.macd, thresholds),
    }
}
