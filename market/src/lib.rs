pub mod bybit;
pub mod errors;
pub mod fetcher;
pub mod indicators;
pub mod types;

pub use errors::FetchError;
pub use fetcher::{CandleFetcher, CandleSource, FetchRetryPolicy, InstrumentSource};
pub use types::{Candle, Direction, Interval};
