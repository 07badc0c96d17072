use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One OHLCV bar as returned by the kline endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Bar open time, unix milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trade direction derived from the oscillator readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
    /// No signal: thresholds not crossed or an indicator is undefined.
    Neutral,
}

impl Direction {
    pub fn is_signal(self) -> bool {
        !matches!(self, Direction::Neutral)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported kline interval: {0}")]
pub struct InvalidInterval(pub String);

/// Minute-based kline interval.
///
/// The API code is the minute count (`"15"`); the display label is the
/// human form used in alerts (`"15m"`, `"4h"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    minutes: u32,
}

impl Interval {
    pub const SUPPORTED_MINUTES: [u32; 10] = [1, 3, 5, 15, 30, 60, 120, 240, 360, 720];

    pub fn from_minutes(minutes: u32) -> Result<Self, InvalidInterval> {
        if Self::SUPPORTED_MINUTES.contains(&minutes) {
            Ok(Self { minutes })
        } else {
            Err(InvalidInterval(minutes.to_string()))
        }
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn api_code(&self) -> String {
        self.minutes.to_string()
    }

    pub fn label(&self) -> String {
        if self.minutes < 60 {
            format!("{}m", self.minutes)
        } else {
            format!("{}h", self.minutes / 60)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Interval {
    type Err = InvalidInterval;

    /// Accepts the API code (`"5"`) or a label (`"5m"`, `"1h"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let invalid = || InvalidInterval(s.trim().to_string());

        let minutes = if let Some(h) = raw.strip_suffix('h') {
            h.parse::<u32>().map_err(|_| invalid())?.checked_mul(60)
        } else {
            raw.strip_suffix('m')
                .unwrap_or(&raw)
                .parse::<u32>()
                .ok()
        };

        minutes
            .ok_or_else(invalid)
            .and_then(|m| Self::from_minutes(m).map_err(|_| invalid()))
    }
}
