use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::FetchError;
use crate::types::Candle;

/// Status fields every v5 response carries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeHeader {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
}

/// Decodes a v5 response body.
///
/// A body that is not JSON is `Malformed`. `retCode` is checked before
/// `result` is looked at, so a non-zero code is always `Api` whatever the
/// payload (on errors Bybit sends `{}` or worse). JSON without the status
/// fields, or with a `result` of the wrong shape, is `UnexpectedShape`.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>, FetchError> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let header = EnvelopeHeader::deserialize(&value)
        .map_err(|e| FetchError::UnexpectedShape(e.to_string()))?;

    if header.ret_code != 0 {
        return Err(FetchError::Api {
            code: header.ret_code,
            message: header.ret_msg,
        });
    }

    match value.get_mut("result").map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(result) => serde_json::from_value(result)
            .map(Some)
            .map_err(|e| FetchError::UnexpectedShape(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentsPage {
    #[serde(default)]
    pub list: Vec<InstrumentInfo>,
    #[serde(default)]
    pub next_page_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub symbol: String,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub settle_coin: String,
}

impl InstrumentInfo {
    /// USDT-settled perpetual that is currently trading.
    pub fn is_tradeable_usdt_perpetual(&self) -> bool {
        self.contract_type == "LinearPerpetual"
            && self.settle_coin == "USDT"
            && self.status == "Trading"
    }
}

/// Kline rows arrive newest first as string arrays:
/// `[startTime, open, high, low, close, volume, turnover]`.
#[derive(Debug, Deserialize)]
pub struct KlinePage {
    #[serde(default)]
    pub list: Vec<Vec<String>>,
}

impl KlinePage {
    /// Parses the rows and reverses them to oldest first.
    pub fn into_candles(self) -> Result<Vec<Candle>, FetchError> {
        let mut candles = self
            .list
            .iter()
            .map(|row| parse_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.reverse();
        Ok(candles)
    }
}

fn parse_row(row: &[String]) -> Result<Candle, FetchError> {
    if row.len() < 6 {
        return Err(FetchError::UnexpectedShape(format!(
            "kline row has {} fields",
            row.len()
        )));
    }

    let num = |idx: usize, name: &str| -> Result<f64, FetchError> {
        row[idx]
            .parse::<f64>()
            .map_err(|_| FetchError::UnexpectedShape(format!("kline {name} is not numeric")))
    };

    let open_time = row[0]
        .parse::<i64>()
        .map_err(|_| FetchError::UnexpectedShape("kline start time is not an integer".into()))?;

    Ok(Candle {
        open_time,
        open: num(1, "open")?,
        high: num(2, "high")?,
        low: num(3, "low")?,
        close: num(4, "close")?,
        volume: num(5, "volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE_OK: &str = r#"{
        "retCode": 0,
        "retMsg": "OK",
        "result": {
            "category": "linear",
            "symbol": "BTCUSDT",
            "list": [
                ["1700000600000", "102", "104", "101", "103", "7.5", "770"],
                ["1700000300000", "101", "103", "100", "102", "5.0", "510"],
                ["1700000000000", "100", "102", "99", "101", "2.5", "250"]
            ]
        },
        "time": 1700000700000
    }"#;

    #[test]
    fn kline_rows_are_reversed_to_oldest_first() {
        let page: KlinePage = decode_envelope(KLINE_OK).unwrap().unwrap();
        let candles = page.into_candles().unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].open_time, 1_700_000_000_000);
        assert_eq!(candles[2].open_time, 1_700_000_600_000);
        assert_eq!(candles[2].close, 103.0);
        assert_eq!(candles[1].volume, 5.0);
    }

    #[test]
    fn non_zero_ret_code_is_api_error() {
        let body = r#"{"retCode": 10001, "retMsg": "params error: symbol invalid", "result": {}}"#;

        match decode_envelope::<KlinePage>(body) {
            Err(FetchError::Api { code, message }) => {
                assert_eq!(code, 10001);
                assert!(message.contains("symbol invalid"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn ret_code_wins_over_a_garbled_result() {
        for body in [
            r#"{"retCode": 10001, "retMsg": "params error", "result": "n/a"}"#,
            r#"{"retCode": 10006, "retMsg": "too many visits", "result": {"list": 7}}"#,
            r#"{"retCode": 10001, "retMsg": "params error"}"#,
        ] {
            let err = decode_envelope::<KlinePage>(body).unwrap_err();
            assert!(matches!(err, FetchError::Api { .. }), "{body} -> {err:?}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = decode_envelope::<KlinePage>("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn json_of_the_wrong_shape_is_unexpected_shape() {
        for body in [
            r#"{"unexpected": true}"#,
            r#"[1, 2, 3]"#,
            r#"{"retCode": 0, "retMsg": "OK", "result": {"list": "oops"}}"#,
        ] {
            let err = decode_envelope::<KlinePage>(body).unwrap_err();
            assert!(matches!(err, FetchError::UnexpectedShape(_)), "{body} -> {err:?}");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn missing_or_null_result_is_no_payload() {
        let body = r#"{"retCode": 0, "retMsg": "OK", "result": null}"#;
        assert!(decode_envelope::<KlinePage>(body).unwrap().is_none());
        let body = r#"{"retCode": 0, "retMsg": "OK"}"#;
        assert!(decode_envelope::<KlinePage>(body).unwrap().is_none());
    }

    #[test]
    fn short_or_garbled_rows_are_unexpected_shape() {
        let short = KlinePage {
            list: vec![vec!["1".into(), "2".into()]],
        };
        assert!(matches!(
            short.into_candles(),
            Err(FetchError::UnexpectedShape(_))
        ));

        let garbled = KlinePage {
            list: vec![vec![
                "1700000000000".into(),
                "1".into(),
                "x".into(),
                "1".into(),
                "1".into(),
                "1".into(),
            ]],
        };
        assert!(matches!(
            garbled.into_candles(),
            Err(FetchError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn instrument_filter() {
        let body = r#"{
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "list": [
                    {"symbol": "BTCUSDT", "contractType": "LinearPerpetual", "status": "Trading", "settleCoin": "USDT"},
                    {"symbol": "BTCPERP", "contractType": "LinearPerpetual", "status": "Trading", "settleCoin": "USDC"},
                    {"symbol": "BTCUSDT-27DEC24", "contractType": "LinearFutures", "status": "Trading", "settleCoin": "USDT"},
                    {"symbol": "OLDUSDT", "contractType": "LinearPerpetual", "status": "Closed", "settleCoin": "USDT"}
                ],
                "nextPageCursor": ""
            }
        }"#;
        let page: InstrumentsPage = decode_envelope(body).unwrap().unwrap();

        let kept: Vec<_> = page
            .list
            .iter()
            .filter(|i| i.is_tradeable_usdt_perpetual())
            .map(|i| i.symbol.as_str())
            .collect();
        assert_eq!(kept, vec!["BTCUSDT"]);
        assert!(page.next_page_cursor.is_empty());
    }
}
