use serde::{
    Deserialize, Deserializer,
    de::{self, IgnoredAny, SeqAccess, Visitor},
};
use std::fmt;

use crate::model::Candle;

/// Error payload Binance sends with non-2xx responses.
#[derive(Deserialize, Debug)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    pub server_time: i64,
    pub rate_limits: Vec<RateLimit>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub rate_limit_type: String, // REQUEST_WEIGHT, RAW_REQUESTS, ORDERS.
    pub interval: String,        // SECOND, MINUTE, HOUR, DAY.
    pub interval_num: u32,
    pub limit: u32,
}

/// One kline row. Binance sends these as positional arrays:
///
/// `[open_time, open, high, low, close, volume, close_time, quote_volume,
///   trade_count, taker_buy_base, taker_buy_quote, ignore]`
///
/// with prices and volumes as decimal strings.
#[derive(Debug)]
pub struct KlineRow(pub Candle);

impl<'de> Deserialize<'de> for KlineRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KlineVisitor;

        fn next<'de, T, A>(
            seq: &mut A,
            index: usize,
            visitor: &KlineVisitor,
        ) -> Result<T, A::Error>
        where
            T: Deserialize<'de>,
            A: SeqAccess<'de>,
        {
            seq.next_element()?
                .ok_or_else(|| de::Error::invalid_length(index, visitor))
        }

        fn decimal<'de, A>(
            seq: &mut A,
            index: usize,
            visitor: &KlineVisitor,
        ) -> Result<f64, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let raw: String = next(seq, index, visitor)?;
            raw.parse()
                .map_err(|e| de::Error::custom(format!("field {} ({:?}): {}", index, raw, e)))
        }

        impl<'de> Visitor<'de> for KlineVisitor {
            type Value = KlineRow;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a kline array of at least 11 values")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<KlineRow, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let open_time = next(&mut seq, 0, &self)?;
                let open = decimal(&mut seq, 1, &self)?;
                let high = decimal(&mut seq, 2, &self)?;
                let low = decimal(&mut seq, 3, &self)?;
                let close = decimal(&mut seq, 4, &self)?;
                let volume = decimal(&mut seq, 5, &self)?;
                let close_time = next(&mut seq, 6, &self)?;
                let quote_asset_volume = decimal(&mut seq, 7, &self)?;
                let number_of_trades = next(&mut seq, 8, &self)?;
                let taker_buy_base_volume = decimal(&mut seq, 9, &self)?;
                let taker_buy_quote_volume = decimal(&mut seq, 10, &self)?;

                // "ignore" and anything appended later.
                while seq.next_element::<IgnoredAny>()?.is_some() {}

                Ok(KlineRow(Candle {
                    open_time,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    close_time,
                    quote_asset_volume,
                    number_of_trades,
                    taker_buy_base_volume,
                    taker_buy_quote_volume,
                }))
            }
        }

        deserializer.deserialize_seq(KlineVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_kline_row() {
        let json = r#"[
            1499040000000,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1499644799999,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "0"
        ]"#;

        let KlineRow(candle) = serde_json::from_str(json).unwrap();

        assert_eq!(candle.open_time, 1499040000000);
        assert_eq!(candle.close_time, 1499644799999);
        assert!((candle.open - 0.0163479).abs() < 1e-12);
        assert!((candle.high - 0.8).abs() < 1e-12);
        assert!((candle.volume - 148976.11427815).abs() < 1e-9);
        assert_eq!(candle.number_of_trades, 308);
        assert!((candle.taker_buy_quote_volume - 28.46694368).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_row() {
        let json = r#"[1499040000000, "0.1", "0.2"]"#;
        let err = serde_json::from_str::<KlineRow>(json).unwrap_err();
        assert!(err.to_string().contains("invalid length 3"));
    }

    #[test]
    fn rejects_non_numeric_price() {
        let json = r#"[0,"abc","1","1","1","1",59999,"1",1,"1","1","0"]"#;
        assert!(serde_json::from_str::<KlineRow>(json).is_err());
    }

    #[test]
    fn decodes_exchange_info_rate_limits() {
        let json = r#"{
            "timezone": "UTC",
            "serverTime": 1565246363776,
            "rateLimits": [
                {"rateLimitType": "REQUEST_WEIGHT", "interval": "MINUTE", "intervalNum": 1, "limit": 6000},
                {"rateLimitType": "ORDERS", "interval": "SECOND", "intervalNum": 10, "limit": 100}
            ],
            "symbols": []
        }"#;

        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.server_time, 1565246363776);
        assert_eq!(info.rate_limits.len(), 2);
        assert_eq!(info.rate_limits[0].rate_limit_type, "REQUEST_WEIGHT");
        assert_eq!(info.rate_limits[1].interval_num, 10);
    }
}
