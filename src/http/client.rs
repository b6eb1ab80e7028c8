use reqwest::{self, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Custom error type for HTTP requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP error: {0} returned status {1}. Response body: {2}")]
    HttpError(reqwest::Url, u16, String),
    #[error("Rate limited (status {0}): {1}")]
    RateLimited(u16, String),
    #[error("Error deserializing JSON: {0}")]
    JsonError(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl RequestError {
    /// Status code returned by the server, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::HttpError(_, status, _) | RequestError::RateLimited(status, _) => {
                Some(*status)
            }
            _ => None,
        }
    }
}

// 429 is the regular throttle, 418 is the auto-ban that follows ignoring it.
fn is_throttled(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT
}

/// Makes a GET request to `path` with query `params` and decodes the JSON body.
pub async fn get<T: DeserializeOwned>(
    client: &reqwest::Client,
    path: &str,                 // Absolute URL.
    params: &[(&str, String)], // Query parameters, in order.
    timeout: Duration,          // Per-call timeout.
) -> Result<T, RequestError> {
    // Construct the URL.
    let url = if params.is_empty() {
        reqwest::Url::parse(path).map_err(|e| RequestError::Other(e.to_string()))?
    } else {
        reqwest::Url::parse_with_params(path, params)
            .map_err(|e| RequestError::Other(e.to_string()))?
    };

    log::debug!("GET {}", url);

    let response = client
        .get(url.as_str())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| RequestError::Transport(e.to_string()))?;

    // Get the response status code.
    let status = response.status();

    // Handle non-success status codes.
    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        if is_throttled(status) {
            return Err(RequestError::RateLimited(status.as_u16(), body));
        }
        return Err(RequestError::HttpError(url, status.as_u16(), body));
    }

    // Deserialize the JSON response.
    response
        .json()
        .await
        .map_err(|e| RequestError::JsonError(e.to_string()))
}
