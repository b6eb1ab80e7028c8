//! Paginated range download.
//!
//! The exchange returns at most `limit` klines per call, so a range is
//! walked page by page: each page starts one interval after the last kline
//! of the previous page, until the range end, an empty page, or a short page.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::time::sleep;

use crate::{
    dates,
    http::client::RequestError,
    model::{Candle, FetchRequest, Interval, InvalidInterval, MAX_LIMIT},
};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: {0}")]
    Upstream(#[source] RequestError),
    #[error("Rate limited by upstream (status {status}): {body}")]
    RateLimited { status: u16, body: String },
}

impl From<RequestError> for FetchError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::RateLimited(status, body) => Self::RateLimited { status, body },
            other => Self::Upstream(other),
        }
    }
}

impl From<InvalidInterval> for FetchError {
    fn from(value: InvalidInterval) -> Self {
        Self::InvalidRequest(value.to_string())
    }
}

/// Parameters of a single upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub symbol: String,
    pub interval: Interval,
    pub start: i64, // Cursor: first open time wanted.
    pub limit: u32,
}

/// Anything that can serve one page of klines starting at a cursor.
///
/// Implementations must return klines ordered by open time, at most
/// `query.limit` of them, none opening before `query.start`.
pub trait KlineSource {
    fn fetch_page(
        &self,
        query: &PageQuery,
    ) -> impl Future<Output = Result<Vec<Candle>, RequestError>> + Send;
}

impl FetchRequest {
    /// Builds a validated request from user-facing values.
    pub fn new(
        symbol: &str,
        interval: &str,
        start: i64,
        end: i64,
        limit: u32,
    ) -> Result<Self, FetchError> {
        let request = FetchRequest {
            symbol: symbol.to_string(),
            interval: interval.parse()?,
            start,
            end,
            limit,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), FetchError> {
        if self.start >= self.end {
            return Err(FetchError::InvalidRequest(format!(
                "start ({}) must be before end ({})",
                self.start, self.end
            )));
        }
        if self.symbol.is_empty() || !self.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FetchError::InvalidRequest(format!(
                "symbol {:?} is not an alphanumeric pair such as ETHBTC",
                self.symbol
            )));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(FetchError::InvalidRequest(format!(
                "limit {} outside 1..={}",
                self.limit, MAX_LIMIT
            )));
        }
        Ok(())
    }
}

/// Downloads every kline with `start <= open_time < end`, in ascending order
/// and without duplicate open times.
///
/// `pacing` is the pause between consecutive upstream calls. Any error aborts
/// the whole download; klines gathered so far are dropped. Klines that have
/// not closed yet are left out.
pub async fn fetch_range<S: KlineSource>(
    source: &S,
    request: &FetchRequest,
    pacing: Duration,
) -> Result<Vec<Candle>, FetchError> {
    fetch_closed_range(source, request, pacing, dates::now_millis()).await
}

/// [`fetch_range`] with an explicit clock: a kline whose `close_time` is at
/// or after `now` is still open, and ends the download.
pub async fn fetch_closed_range<S: KlineSource>(
    source: &S,
    request: &FetchRequest,
    pacing: Duration,
    now: i64,
) -> Result<Vec<Candle>, FetchError> {
    request.validate()?;

    log::info!(
        "Fetching {} {} klines in [{}, {})",
        request.symbol,
        request.interval,
        request.start,
        request.end
    );

    let mut candles: Vec<Candle> = Vec::new();
    let mut cursor = request.start;
    let mut page_num = 0;

    loop {
        if page_num > 0 && !pacing.is_zero() {
            sleep(pacing).await;
        }
        page_num += 1;

        let query = PageQuery {
            symbol: request.symbol.clone(),
            interval: request.interval,
            start: cursor,
            limit: request.limit,
        };
        let page = source.fetch_page(&query).await?;

        let Some(last) = page.last() else {
            log::debug!("page {}: empty, no more data", page_num);
            break;
        };
        let last_open = last.open_time;
        let page_len = page.len();

        let mut done = false;
        for candle in page {
            if candle.open_time >= request.end {
                log::debug!("reached requested end {}", request.end);
                done = true;
                break;
            }
            if candle.close_time >= now {
                log::debug!("kline at {} is still open, stopping", candle.open_time);
                done = true;
                break;
            }
            if candle.open_time < request.start {
                continue;
            }
            // Page boundaries may overlap; open time is the key.
            if candles
                .last()
                .is_some_and(|prev| candle.open_time <= prev.open_time)
            {
                log::debug!("dropping duplicate kline at {}", candle.open_time);
                continue;
            }
            candles.push(candle);
        }

        log::info!(
            "page {}: received {} klines (total so far: {})",
            page_num,
            page_len,
            candles.len()
        );

        if done {
            break;
        }
        if page_len < request.limit as usize {
            log::debug!(
                "short page ({} < {}), upstream has no more data",
                page_len,
                request.limit
            );
            break;
        }

        match request.interval.next_open(last_open) {
            Some(next) if next > cursor => cursor = next,
            _ => {
                log::warn!("cursor did not advance past {}, stopping", cursor);
                break;
            }
        }
        if cursor >= request.end {
            break;
        }
    }

    log::info!("Fetched {} klines in {} requests", candles.len(), page_num);
    Ok(candles)
}
