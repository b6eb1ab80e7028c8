use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use csv::Writer;

use crate::{
    dates,
    model::{Candle, Interval},
};

const HEADER: [&str; 11] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_asset_volume",
    "number_of_trades",
    "taker_buy_base_volume",
    "taker_buy_quote_volume",
];

/// `<YYYY-MM-DD_HHMMSS>_<SYMBOL>_<interval>_klines.csv`
pub fn default_file_name(now: DateTime<Local>, symbol: &str, interval: Interval) -> String {
    format!(
        "{}_{}_{}_klines.csv",
        dates::file_stamp(now),
        symbol,
        interval
    )
}

fn price(value: f64) -> String {
    format!("{:.9}", value)
}

/// Writes the header and one row per candle to `out`.
pub fn write_candles<W: Write>(out: W, candles: &[Candle]) -> csv::Result<()> {
    let mut writer = Writer::from_writer(out);

    writer.write_record(HEADER)?;
    for candle in candles {
        writer.write_record([
            dates::format_millis(candle.open_time),
            price(candle.open),
            price(candle.high),
            price(candle.low),
            price(candle.close),
            price(candle.volume),
            dates::format_millis(candle.close_time),
            price(candle.quote_asset_volume),
            candle.number_of_trades.to_string(),
            price(candle.taker_buy_base_volume),
            price(candle.taker_buy_quote_volume),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `candles` to `path`, replacing any existing file only once the
/// whole content is on disk. A `.part` sibling holds the data meanwhile.
pub fn save(path: &Path, candles: &[Candle]) -> csv::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = fs::File::create(&part)
        .map_err(csv::Error::from)
        .and_then(|file| write_candles(io::BufWriter::new(file), candles))
        .and_then(|_| fs::rename(&part, path).map_err(csv::Error::from));

    if result.is_err() {
        // Best effort; the original error is what matters.
        let _ = fs::remove_file(&part);
    }
    result
}
