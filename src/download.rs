use std::{
    error::Error,
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Local;

use crate::{
    binance::api_caller::{self, BinanceClient},
    config::Config,
    dates,
    fetcher::{self, FetchError, KlineSource},
    model::{Candle, FetchRequest, Interval, MAX_LIMIT},
    store::csv_file,
};

/// Klines fetched when the range is open on one or both sides.
pub const DEFAULT_COUNT: u32 = 1000;

/// Pause between pages when the exchange's limits cannot be looked up.
pub const FALLBACK_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug)]
pub enum DownloadError {
    InvalidRange(String),
    FetchFailed(FetchError),
    CouldNotWrite(PathBuf, csv::Error),
}

impl Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::InvalidRange(msg) => write!(f, "invalid range: {}", msg),
            DownloadError::FetchFailed(err) => write!(f, "{}", err),
            DownloadError::CouldNotWrite(path, err) => {
                write!(f, "could not write {}: {}", path.display(), err)
            }
        }
    }
}

impl Error for DownloadError {}

impl From<FetchError> for DownloadError {
    fn from(value: FetchError) -> Self {
        Self::FetchFailed(value)
    }
}

/// What the user asked for on the command line, dates already parsed.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub symbol: String,
    pub interval: Interval,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub count: Option<u32>,
    pub limit: u32,
    pub output: Option<PathBuf>,
}

/// Caps the per-call limit at what the exchange accepts.
pub fn clamp_limit(limit: u32) -> u32 {
    if limit > MAX_LIMIT {
        log::warn!("Clamping kline request limit {} to {}", limit, MAX_LIMIT);
        MAX_LIMIT
    } else {
        limit
    }
}

/// Fills in a missing start and/or end. The end never lies past `now`.
///
/// - start and end: used as given (`count` is ignored)
/// - start only: `count` klines from start, or up to `now` without a count
/// - end only: `count` klines (default 1000) up to end
/// - neither: the most recent `count` klines (default 1000)
pub fn resolve_range(
    start: Option<i64>,
    end: Option<i64>,
    count: Option<u32>,
    interval: Interval,
    now: i64,
) -> Result<(i64, i64)> {
    let back = |end: i64| {
        let n = count.unwrap_or(DEFAULT_COUNT);
        interval
            .offset(end, -i64::from(n))
            .ok_or_else(|| DownloadError::InvalidRange(format!("{} klines before {}", n, end)))
    };

    let range = match (start, end) {
        (Some(start), Some(end)) => {
            if count.is_some() {
                log::info!("Found start and end date, ignoring count");
            }
            (start, end)
        }
        (Some(start), None) => match count {
            Some(n) => {
                log::info!("Found start date and count, fetching max of {} klines", n);
                let end = interval.offset(start, i64::from(n)).ok_or_else(|| {
                    DownloadError::InvalidRange(format!("{} klines after {}", n, start))
                })?;
                (start, end)
            }
            None => {
                log::info!("Found start date but no end date or count, fetching to now");
                (start, now)
            }
        },
        (None, Some(end)) => {
            log::info!("Found end date, fetching klines up to it");
            (back(end)?, end)
        }
        (None, None) => {
            log::info!("No start or end date, fetching most recent klines");
            (back(now)?, now)
        }
    };

    let range = if range.1 > now {
        log::debug!("end {} is in the future, stopping at now", range.1);
        (range.0, now)
    } else {
        range
    };

    if range.0 >= range.1 {
        return Err(DownloadError::InvalidRange(format!(
            "start {} is not before end {}",
            dates::format_millis(range.0),
            dates::format_millis(range.1)
        )));
    }
    Ok(range)
}

/// Spacing between page requests: the configured value, else derived from
/// the exchange's published request limits, else a fixed fallback.
pub async fn request_pacing(client: &BinanceClient, config: &Config, symbol: &str) -> Duration {
    if let Some(interval) = config.request_interval {
        return interval;
    }
    match client.exchange_info(symbol).await {
        Ok(info) => {
            api_caller::min_request_interval(&info.rate_limits, api_caller::KLINES_WEIGHT)
                .unwrap_or(FALLBACK_REQUEST_INTERVAL)
        }
        Err(err) => {
            log::warn!(
                "Could not read exchange rate limits ({}), pausing {:?} between requests",
                err,
                FALLBACK_REQUEST_INTERVAL
            );
            FALLBACK_REQUEST_INTERVAL
        }
    }
}

/// Fetches the whole range, then writes it. Nothing is written on failure.
pub async fn fetch_and_save<S: KlineSource>(
    source: &S,
    request: &FetchRequest,
    pacing: Duration,
    path: &Path,
) -> Result<Vec<Candle>> {
    let candles = fetcher::fetch_range(source, request, pacing).await?;

    csv_file::save(path, &candles)
        .map_err(|err| DownloadError::CouldNotWrite(path.to_path_buf(), err))?;

    log::info!("Wrote {} klines to {}", candles.len(), path.display());
    Ok(candles)
}

/// Runs one CLI download against Binance and returns the written file path.
pub async fn download(options: DownloadOptions, config: &Config) -> Result<PathBuf> {
    let now = dates::now_millis();
    let (start, end) = resolve_range(
        options.start,
        options.end,
        options.count,
        options.interval,
        now,
    )?;

    let request = FetchRequest {
        symbol: options.symbol,
        interval: options.interval,
        start,
        end,
        limit: clamp_limit(options.limit),
    };
    request.validate()?;

    let path = options.output.unwrap_or_else(|| {
        PathBuf::from(csv_file::default_file_name(
            Local::now(),
            &request.symbol,
            request.interval,
        ))
    });

    let client = BinanceClient::new(config);
    let pacing = request_pacing(&client, config, &request.symbol).await;
    log::debug!("pausing {:?} between requests", pacing);

    fetch_and_save(&client, &request, pacing, &path).await?;
    Ok(path)
}
