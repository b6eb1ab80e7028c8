use std::{future::Future, time::Duration};

use super::response::{ApiError, ExchangeInfo, KlineRow, RateLimit};
use crate::{
    config::Config,
    fetcher::{KlineSource, PageQuery},
    http::{
        client::{self, RequestError},
        retry::{RetryPolicy, is_transient, retry_with_backoff},
    },
    model::Candle,
};

const KLINES_PATH: &str = "/api/v3/klines";
const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";

/// Request weight Binance charges for one klines call.
pub const KLINES_WEIGHT: u32 = 2;

/// Client for the public (unauthenticated) Binance spot REST endpoints.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl BinanceClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            retry: config.retry.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetches one page of klines starting at `query.start`.
    pub async fn klines(&self, query: &PageQuery) -> Result<Vec<Candle>, RequestError> {
        let url = self.url(KLINES_PATH);
        let params = [
            ("symbol", query.symbol.clone()),
            ("interval", query.interval.as_str().to_string()),
            ("startTime", query.start.to_string()),
            ("limit", query.limit.to_string()),
        ];

        let rows: Vec<KlineRow> = retry_with_backoff(&self.retry, is_transient, || {
            client::get(&self.http, &url, &params, self.timeout)
        })
        .await
        .map_err(describe_api_error)?;

        Ok(rows.into_iter().map(|KlineRow(candle)| candle).collect())
    }

    /// Fetches exchange metadata, including the request rate limits.
    pub async fn exchange_info(&self, symbol: &str) -> Result<ExchangeInfo, RequestError> {
        let params = [("symbol", symbol.to_string())];
        client::get(&self.http, &self.url(EXCHANGE_INFO_PATH), &params, self.timeout)
            .await
            .map_err(describe_api_error)
    }
}

impl KlineSource for BinanceClient {
    fn fetch_page(
        &self,
        query: &PageQuery,
    ) -> impl Future<Output = Result<Vec<Candle>, RequestError>> + Send {
        self.klines(query)
    }
}

// Replaces a raw `{"code":..,"msg":..}` body with a readable message.
fn describe_api_error(err: RequestError) -> RequestError {
    let describe = |body: String| match serde_json::from_str::<ApiError>(&body) {
        Ok(api) => format!("Binance error {}: {}", api.code, api.msg),
        Err(_) => body,
    };
    match err {
        RequestError::HttpError(url, status, body) => {
            RequestError::HttpError(url, status, describe(body))
        }
        RequestError::RateLimited(status, body) => {
            RequestError::RateLimited(status, describe(body))
        }
        other => other,
    }
}

fn interval_seconds(interval: &str) -> Option<f64> {
    match interval {
        "SECOND" => Some(1.0),
        "MINUTE" => Some(60.0),
        "HOUR" => Some(3600.0),
        "DAY" => Some(86400.0),
        _ => None,
    }
}

/// Smallest spacing between calls of the given `weight` that keeps every
/// request-type limit satisfied. `None` if no usable request limit is listed.
pub fn min_request_interval(rate_limits: &[RateLimit], weight: u32) -> Option<Duration> {
    let max_per_second = rate_limits
        .iter()
        .filter(|rate| rate.rate_limit_type.contains("REQUEST"))
        .filter_map(|rate| {
            let window = interval_seconds(&rate.interval)? * f64::from(rate.interval_num);
            if window <= 0.0 || rate.limit == 0 {
                return None;
            }
            let per_second = f64::from(rate.limit) / window;
            if rate.rate_limit_type == "REQUEST_WEIGHT" {
                Some(per_second / f64::from(weight.max(1)))
            } else {
                Some(per_second)
            }
        })
        .reduce(f64::min)?;

    log::info!(
        "Maximum permitted request frequency for weight {} is {:.2} / sec",
        weight,
        max_per_second
    );
    Some(Duration::from_secs_f64(1.0 / max_per_second))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(kind: &str, interval: &str, num: u32, limit: u32) -> RateLimit {
        RateLimit {
            rate_limit_type: kind.into(),
            interval: interval.into(),
            interval_num: num,
            limit,
        }
    }

    #[test]
    fn weight_limit_dominates() {
        let limits = [
            limit("REQUEST_WEIGHT", "MINUTE", 1, 6000),
            limit("RAW_REQUESTS", "MINUTE", 5, 61000),
            limit("ORDERS", "SECOND", 10, 1),
        ];

        // 6000 weight/min at weight 2 is 50 calls/sec.
        assert_eq!(
            min_request_interval(&limits, 2),
            Some(Duration::from_millis(20))
        );
    }

    #[test]
    fn raw_request_limit_ignores_weight() {
        let limits = [limit("RAW_REQUESTS", "SECOND", 1, 4)];
        assert_eq!(
            min_request_interval(&limits, 10),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn no_request_limits() {
        assert_eq!(min_request_interval(&[], 1), None);
        let limits = [
            limit("ORDERS", "DAY", 1, 200000),
            limit("REQUEST_WEIGHT", "FORTNIGHT", 1, 10),
        ];
        assert_eq!(min_request_interval(&limits, 1), None);
    }

    #[test]
    fn api_error_body_is_made_readable() {
        let url = reqwest::Url::parse("https://api.binance.com/api/v3/klines").unwrap();
        let err = describe_api_error(RequestError::HttpError(
            url,
            400,
            r#"{"code":-1121,"msg":"Invalid symbol."}"#.into(),
        ));
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("Binance error -1121: Invalid symbol."));

        let err = describe_api_error(RequestError::RateLimited(429, "slow down".into()));
        assert!(err.to_string().contains("slow down"));
    }
}
