use crate::types::Candle;

/// Latest %K / %D reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stochastic {
    pub percent_k: f64,
    pub percent_d: f64,
}

/// Stochastic oscillator over candles ordered oldest to newest.
///
/// Needs `k_period + d_period - 1` candles; only that trailing slice is
/// read. A window whose high equals its low yields %K = 0.
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Option<Stochastic> {
    if k_period == 0 || d_period == 0 {
        return None;
    }

    let needed = k_period + d_period - 1;
    if candles.len() < needed {
        return None;
    }

    let tail = &candles[candles.len() - needed..];

    let k_values: Vec<f64> = tail
        .windows(k_period)
        .map(|window| {
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let close = window[k_period - 1].close;

            if highest == lowest {
                0.0
            } else {
                (close - lowest) / (highest - lowest) * 100.0
            }
        })
        .collect();

    let percent_k = *k_values.last()?;
    let percent_d = k_values[k_values.len() - d_period..].iter().sum::<f64>() / d_period as f64;

    Some(Stochastic {
        percent_k,
        percent_d,
    })
}
