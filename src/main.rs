use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use dotenv::dotenv;
use kline_downloader::{
    config::Config,
    dates::{self, DateFormat},
    download::{self, DownloadOptions},
    model::{Interval, MAX_LIMIT},
};

// Command-line argument parser.
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Download Binance candlestick (k-line) data from the REST API into a CSV file"
)]
struct Args {
    /// Kline interval: 1m 3m 5m 15m 30m 1h 2h 4h 6h 8h 12h 1d 3d 1w 1M
    #[arg(short, long)]
    interval: Interval,

    /// Trading pair
    #[arg(short, long, default_value = "ETHBTC")]
    symbol: String,

    /// Start of the period (inclusive), e.g. 2018/01/31 or "2018/01/31 12:00"
    #[arg(long)]
    start: Option<String>,

    /// End of the period (exclusive)
    #[arg(short, long)]
    end: Option<String>,

    /// Number of klines to fetch when start or end is missing
    #[arg(short, long)]
    count: Option<u32>,

    /// Maximum klines per request
    #[arg(short, long, default_value_t = MAX_LIMIT)]
    limit: u32,

    /// Output file. Defaults to <timestamp>_<symbol>_<interval>_klines.csv
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field order of dates: YMD, DMY or MDY
    #[arg(short, long, default_value = "YMD")]
    dateformat: String,

    /// Per-request timeout in seconds (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Retries for transient network/server errors
    #[arg(long)]
    retries: Option<u32>,

    /// Fixed pause between requests in milliseconds
    #[arg(long)]
    request_interval_ms: Option<u64>,
}

fn date_format(name: &str) -> DateFormat {
    name.parse().unwrap_or_else(|_| {
        log::warn!("dateformat given ({}) not known. Using YMD", name);
        DateFormat::Ymd
    })
}

fn parse_date(input: Option<&str>, format: DateFormat) -> Result<Option<i64>, dates::DateError> {
    input.map(|s| dates::to_millis(s, format)).transpose()
}

#[tokio::main]
// Main function entry point.
async fn main() -> ExitCode {
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Error reading configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(secs) = args.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = args.retries {
        config.retry.max_retries = retries;
    }
    if let Some(ms) = args.request_interval_ms {
        config.request_interval = Some(Duration::from_millis(ms));
    }

    let format = date_format(&args.dateformat);
    let (start, end) = match (
        parse_date(args.start.as_deref(), format),
        parse_date(args.end.as_deref(), format),
    ) {
        (Ok(start), Ok(end)) => (start, end),
        (Err(err), _) | (_, Err(err)) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let options = DownloadOptions {
        symbol: args.symbol.trim().to_uppercase(),
        interval: args.interval,
        start,
        end,
        count: args.count,
        limit: args.limit,
        output: args.output,
    };

    match download::download(options, &config).await {
        Ok(path) => {
            log::info!("Download finished successfully: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("Download failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_rejected() {
        let args = Args::try_parse_from(["kline_downloader", "-i", "1m", "--timeout", "0"]);
        assert!(args.is_err());

        let args =
            Args::try_parse_from(["kline_downloader", "-i", "1m", "--timeout", "3"]).unwrap();
        assert_eq!(args.timeout, Some(3));
        assert_eq!(args.interval, Interval::M1);
    }
}
