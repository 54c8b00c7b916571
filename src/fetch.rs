use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{DispatcherError, Result};

/// Builds the shared HTTP client used for the registry and the news feed.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()?)
}

/// GETs `url`, retrying transport failures and non-success statuses up to
/// `attempts` times in total with no delay in between.
pub async fn get_bytes(client: &Client, url: &str, attempts: u32) -> Result<Vec<u8>> {
    for attempt in 1..=attempts {
        match try_get(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                tracing::debug!(url, attempt, attempts, error = %e, "fetch attempt failed");
            }
        }
    }
    Err(DispatcherError::FetchExhausted {
        url: url.to_string(),
        attempts,
    })
}

/// Like [`get_bytes`], then decodes the body. A malformed body is not retried.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str, attempts: u32) -> Result<T> {
    let body = get_bytes(client, url, attempts).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn try_get(client: &Client, url: &str) -> std::result::Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
