use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::bybit::types::{InstrumentsPage, KlinePage, decode_envelope};
use crate::errors::FetchError;
use crate::fetcher::{CandleSource, InstrumentSource};
use crate::types::{Candle, Interval};

pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";

/// Upper bound the instruments endpoint accepts for `limit`.
const INSTRUMENTS_PAGE_LIMIT: &str = "1000";

/// Guards against a cursor that never drains.
const MAX_INSTRUMENT_PAGES: usize = 20;

/// Bybit v5 market-data client for the `linear` category.
#[derive(Clone)]
pub struct BybitClient {
    http: Client,
    url: String,
}

impl BybitClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GETs `path` and decodes the v5 envelope.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, FetchError> {
        let url = format!("{}{}", self.url, path);

        let body = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        decode_envelope(&body)
    }
}

#[async_trait]
impl InstrumentSource for BybitClient {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_instruments(&self) -> Result<Vec<String>, FetchError> {
        let mut symbols = Vec::new();
        let mut cursor = String::new();

        for _ in 0..MAX_INSTRUMENT_PAGES {
            let mut query = vec![("category", "linear"), ("limit", INSTRUMENTS_PAGE_LIMIT)];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let Some(page) = self
                .get::<InstrumentsPage>("/v5/market/instruments-info", &query)
                .await?
            else {
                break;
            };

            symbols.extend(
                page.list
                    .into_iter()
                    .filter(|i| i.is_tradeable_usdt_perpetual())
                    .map(|i| i.symbol),
            );

            if page.next_page_cursor.is_empty() {
                break;
            }
            cursor = page.next_page_cursor;
        }

        debug!(count = symbols.len(), "bybit instruments fetched");
        Ok(symbols)
    }
}

#[async_trait]
impl CandleSource for BybitClient {
    #[instrument(
        skip(self),
        fields(symbol = %symbol, interval = %interval),
        level = "debug"
    )]
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let code = interval.api_code();
        let limit = limit.to_string();
        let query = [
            ("category", "linear"),
            ("symbol", symbol),
            ("interval", code.as_str()),
            ("limit", limit.as_str()),
        ];

        let candles = match self.get::<KlinePage>("/v5/market/kline", &query).await? {
            Some(page) => page.into_candles()?,
            None => Vec::new(),
        };

        debug!(count = candles.len(), "bybit klines fetched");
        Ok(candles)
    }
}
