use std::fmt;
use std::str::FromStr;

use market::FetchRetryPolicy;
use market::Interval;
use market::bybit::client::DEFAULT_BASE_URL as BYBIT_DEFAULT_URL;
use market::indicators::{IndicatorParams, Thresholds};

use crate::delivery::retry::SendRetryPolicy;
use crate::delivery::telegram::DEFAULT_API_URL as TELEGRAM_DEFAULT_URL;
use crate::error::ConfigError;

#[derive(Clone)]
pub struct AppConfig {
    // =========================
    // Delivery channel
    // =========================
    /// Telegram bot token. Required.
    pub bot_token: String,

    /// Target chat id. Required.
    pub chat_id: String,

    /// Telegram Bot API base url.
    pub telegram_api_url: String,

    // =========================
    // Run shape
    // =========================
    /// Hard cap on messages accepted for delivery in one run.
    pub message_limit: usize,

    /// Manual runs scan every configured interval. Scheduled runs only
    /// scan intervals aligned with the current minute and are a no-op
    /// otherwise.
    pub manual_run: bool,

    /// Kline intervals, processed in this order for every instrument.
    pub intervals: Vec<Interval>,

    /// Symbols never scanned (compared case-insensitively).
    pub excluded_symbols: Vec<String>,

    /// Send a notice through the delivery channel when the instrument
    /// list comes back empty.
    pub notify_empty_instruments: bool,

    // =========================
    // Signal rule
    // =========================
    pub thresholds: Thresholds,
    pub indicator_params: IndicatorParams,

    // =========================
    // Concurrency
    // =========================
    /// Instruments processed concurrently by the fan-out.
    ///
    /// Bounds both memory and the request rate against the data provider.
    pub max_concurrent_tasks: usize,

    /// Number of delivery workers draining the queue.
    pub delivery_workers: usize,

    /// Concurrent outbound sends across the whole worker pool.
    pub max_concurrent_sends: usize,

    // =========================
    // Data provider
    // =========================
    pub bybit_base_url: String,

    pub fetch_retry: FetchRetryPolicy,
    pub send_retry: SendRetryPolicy,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("message_limit", &self.message_limit)
            .field("manual_run", &self.manual_run)
            .field("intervals", &self.intervals)
            .field("excluded_symbols", &self.excluded_symbols)
            .field("thresholds", &self.thresholds)
            .field("indicator_params", &self.indicator_params)
            .field("max_concurrent_tasks", &self.max_concurrent_tasks)
            .field("delivery_workers", &self.delivery_workers)
            .field("max_concurrent_sends", &self.max_concurrent_sends)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let chat_id = get("CHAT_ID").ok_or(ConfigError::Missing("CHAT_ID"))?;

        let delivery_workers = parse_or(&get, "MAX_WORKERS", 5usize)?;

        let thresholds = Thresholds {
            oversold: parse_or(&get, "OVERSOLD", 20.0)?,
            overbought: parse_or(&get, "OVERBOUGHT", 80.0)?,
        };

        let indicator_params = IndicatorParams {
            k_period: parse_or(&get, "K_PERIOD", 14)?,
            d_period: parse_or(&get, "D_PERIOD", 3)?,
            fast_period: parse_or(&get, "FAST_PERIOD", 12)?,
            slow_period: parse_or(&get, "SLOW_PERIOD", 26)?,
            signal_period: parse_or(&get, "SIGNAL_PERIOD", 9)?,
        };

        let cfg = Self {
            bot_token,
            chat_id,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| TELEGRAM_DEFAULT_URL.to_string()),

            message_limit: parse_or(&get, "MESSAGE_LIMIT", 10)?,
            manual_run: parse_bool_or(&get, "MANUAL_RUN", false)?,
            intervals: parse_intervals(get("INTERVALS").as_deref().unwrap_or("5,15"))?,
            excluded_symbols: parse_list(get("EXCLUDED_SYMBOLS").as_deref().unwrap_or("USDCUSDT")),
            notify_empty_instruments: parse_bool_or(&get, "NOTIFY_EMPTY_INSTRUMENTS", true)?,

            thresholds,
            indicator_params,

            max_concurrent_tasks: parse_or(&get, "MAX_CONCURRENT_TASKS", 50)?,
            delivery_workers,
            max_concurrent_sends: parse_or(&get, "MAX_CONCURRENT_SENDS", delivery_workers)?,

            bybit_base_url: get("BYBIT_BASE_URL").unwrap_or_else(|| BYBIT_DEFAULT_URL.to_string()),

            fetch_retry: FetchRetryPolicy::default(),
            send_retry: SendRetryPolicy::default(),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Whether `symbol` is on the denylist.
    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded_symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("MAX_CONCURRENT_TASKS", self.max_concurrent_tasks),
            ("MAX_WORKERS", self.delivery_workers),
            ("MAX_CONCURRENT_SENDS", self.max_concurrent_sends),
            ("K_PERIOD", self.indicator_params.k_period),
            ("D_PERIOD", self.indicator_params.d_period),
            ("FAST_PERIOD", self.indicator_params.fast_period),
            ("SLOW_PERIOD", self.indicator_params.slow_period),
            ("SIGNAL_PERIOD", self.indicator_params.signal_period),
        ];
        for (var, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        let params = &self.indicator_params;
        if params.fast_period >= params.slow_period {
            return Err(ConfigError::Invalid {
                var: "FAST_PERIOD",
                value: params.fast_period.to_string(),
                reason: format!("must be below SLOW_PERIOD ({})", params.slow_period),
            });
        }

        if self.thresholds.oversold > self.thresholds.overbought {
            return Err(ConfigError::Invalid {
                var: "OVERSOLD",
                value: self.thresholds.oversold.to_string(),
                reason: format!("above OVERBOUGHT ({})", self.thresholds.overbought),
            });
        }

        if self.intervals.is_empty() {
            return Err(ConfigError::Invalid {
                var: "INTERVALS",
                value: String::new(),
                reason: "at least one interval is required".into(),
            });
        }

        Ok(())
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool_or<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(var) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected true or false".into(),
        }),
    }
}

fn parse_intervals(raw: &str) -> Result<Vec<Interval>, ConfigError> {
    let mut out: Vec<Interval> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let interval = part.parse::<Interval>().map_err(|e| ConfigError::Invalid {
            var: "INTERVALS",
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !out.contains(&interval) {
            out.push(interval);
        }
    }
    Ok(out)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
