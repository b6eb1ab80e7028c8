use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Months};
use thiserror::Error;

/// Upper bound Binance accepts for the `limit` query parameter on klines.
pub const MAX_LIMIT: u32 = 1000;

/// Structure representing one kline (candlestick) as returned by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: i64,              // Open time, ms since epoch. Unique key per stream.
    pub open: f64,                   // Opening price.
    pub high: f64,                   // Highest price.
    pub low: f64,                    // Lowest price.
    pub close: f64,                  // Closing price.
    pub volume: f64,                 // Base asset volume.
    pub close_time: i64,             // Close time, ms since epoch.
    pub quote_asset_volume: f64,     // Quote asset volume.
    pub number_of_trades: u64,       // Number of trades.
    pub taker_buy_base_volume: f64,  // Taker buy base asset volume.
    pub taker_buy_quote_volume: f64, // Taker buy quote asset volume.
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0} not recognized as valid Binance k-line interval")]
pub struct InvalidInterval(pub String);

/// Kline granularities supported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    Month1,
}

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

impl Interval {
    pub const ALL: [Interval; 15] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::D3,
        Interval::W1,
        Interval::Month1,
    ];

    /// Wire code used by the exchange (`1m`, `4h`, `1M`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::Month1 => "1M",
        }
    }

    /// Length in milliseconds, or `None` for the calendar month interval.
    pub fn fixed_millis(&self) -> Option<i64> {
        match self {
            Interval::M1 => Some(MINUTE_MS),
            Interval::M3 => Some(3 * MINUTE_MS),
            Interval::M5 => Some(5 * MINUTE_MS),
            Interval::M15 => Some(15 * MINUTE_MS),
            Interval::M30 => Some(30 * MINUTE_MS),
            Interval::H1 => Some(HOUR_MS),
            Interval::H2 => Some(2 * HOUR_MS),
            Interval::H4 => Some(4 * HOUR_MS),
            Interval::H6 => Some(6 * HOUR_MS),
            Interval::H8 => Some(8 * HOUR_MS),
            Interval::H12 => Some(12 * HOUR_MS),
            Interval::D1 => Some(DAY_MS),
            Interval::D3 => Some(3 * DAY_MS),
            Interval::W1 => Some(7 * DAY_MS),
            Interval::Month1 => None,
        }
    }

    /// Moves `timestamp` by `n` intervals (negative `n` steps backwards).
    ///
    /// Month steps follow the UTC calendar. Returns `None` on overflow or if
    /// the timestamp is outside the range chrono can represent.
    pub fn offset(&self, timestamp: i64, n: i64) -> Option<i64> {
        match self.fixed_millis() {
            Some(ms) => timestamp.checked_add(n.checked_mul(ms)?),
            None => {
                let dt = DateTime::from_timestamp_millis(timestamp)?;
                let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
                let moved = if n >= 0 {
                    dt.checked_add_months(months)?
                } else {
                    dt.checked_sub_months(months)?
                };
                Some(moved.timestamp_millis())
            }
        }
    }

    /// Open time of the kline following the one that opens at `open_time`.
    pub fn next_open(&self, open_time: i64) -> Option<i64> {
        self.offset(open_time, 1)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .find(|interval| interval.as_str() == s)
            .copied()
            .ok_or_else(|| InvalidInterval(s.to_string()))
    }
}

/// One range download: `[start, end)` in ms, paged `limit` klines at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbol: String,
    pub interval: Interval,
    pub start: i64, // Inclusive.
    pub end: i64,   // Exclusive.
    pub limit: u32, // Max klines per upstream call.
}
