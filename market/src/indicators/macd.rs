use crate::types::Candle;

/// Latest MACD line, signal line and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Macd {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// Exponential moving average with factor `2 / (period + 1)`.
///
/// The first defined value sits at index `period - 1` and is the simple
/// average of the first `period` points; every earlier slot is `None`.
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);

    for (i, value) in data.iter().enumerate().skip(period) {
        prev = (value - prev) * multiplier + prev;
        out[i] = Some(prev);
    }

    out
}

/// MACD over closing prices of candles ordered oldest to newest.
///
/// Needs `slow_period + signal_period` candles, otherwise every field is
/// `None`.
pub fn macd(
    candles: &[Candle],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Macd {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 {
        return Macd::default();
    }
    if candles.len() < slow_period + signal_period {
        return Macd::default();
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let fast = ema(&closes, fast_period);
    let slow = ema(&closes, slow_period);

    let macd_line: Vec<f64> = fast
        .iter()
        .zip(&slow)
        .filter_map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    if macd_line.len() < signal_period {
        return Macd::default();
    }

    let signal_line = ema(&macd_line, signal_period);

    let macd = macd_line.last().copied();
    let signal = signal_line.last().copied().flatten();
    let histogram = match (macd, signal) {
        (Some(m), Some(s)) => Some(m - s),
        _ => None,
    };

    Macd {
        macd,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes(values: &[f64]) -> Vec<Candle> {
        values
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: i as i64 * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn ema_seeds_with_simple_average() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        // (4 - 2) * 0.5 + 2
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn ema_shorter_than_period_is_undefined() {
        assert!(ema(&[1.0, 2.0], 3).iter().all(Option::is_none));
        assert!(ema(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn undefined_below_slow_plus_signal() {
        let candles = closes(&(0..34).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        assert_eq!(macd(&candles, 12, 26, 9), Macd::default());
    }

    #[test]
    fn constant_series_has_zero_lines() {
        let candles = closes(&[50.0; 40]);
        let m = macd(&candles, 12, 26, 9);
        assert_eq!(m.macd, Some(0.0));
        assert_eq!(m.signal, Some(0.0));
        assert_eq!(m.histogram, Some(0.0));
    }

    #[test]
    fn falling_series_has_negative_macd() {
        let candles = closes(&(0..40).map(|i| 200.0 - i as f64).collect::<Vec<_>>());
        let m = macd(&candles, 12, 26, 9);
        let line = m.macd.unwrap();
        let signal = m.signal.unwrap();
        assert!(line < 0.0);
        assert!((m.histogram.unwrap() - (line - signal)).abs() < 1e-12);
    }

    #[test]
    fn hand_computed_small_periods() {
        // fast=2, slow=3, signal=2 over closes 1..=5
        // fast ema: -, 1.5, 2.5, 3.5, 4.5
        // slow ema: -, -, 2, 3, 4
        // macd: 0.5, 0.5, 0.5 -> signal ema(2): -, 0.5, 0.5
        let candles = closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let m = macd(&candles, 2, 3, 2);
        assert!((m.macd.unwrap() - 0.5).abs() < 1e-12);
        assert!((m.signal.unwrap() - 0.5).abs() < 1e-12);
        assert!(m.histogram.unwrap().abs() < 1e-12);
    }
}
