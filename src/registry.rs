//! Client for the registry service that stores the watermark and the
//! encrypted device token list.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::fetch;

/// Persisted "processed up to here" cursor, in seconds since the Unix epoch.
pub trait WatermarkStore: Send + Sync {
    fn get(&self) -> impl Future<Output = Result<f64>> + Send;
    fn set(&self, watermark: f64) -> impl Future<Output = Result<()>> + Send;
}

/// Directory of encrypted recipient tokens, keyed by an opaque registration id.
pub trait RecipientDirectory: Send + Sync {
    fn encrypted_tokens(&self) -> impl Future<Output = Result<BTreeMap<String, String>>> + Send;
}

#[derive(Debug, Deserialize)]
struct WatermarkResponse {
    timestamp: f64,
}

#[derive(Debug, Deserialize)]
struct TokenListResponse {
    #[serde(default)]
    tokens: BTreeMap<String, String>,
}

/// HTTP implementation of both registry traits.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    attempts: u32,
}

impl RegistryClient {
    pub fn new(base_url: &str, attempts: u32, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(fetch::http_client(timeout)?, base_url, attempts))
    }

    pub fn with_client(client: Client, base_url: &str, attempts: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            attempts,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl WatermarkStore for RegistryClient {
    async fn get(&self) -> Result<f64> {
        let url = self.url("/datemeta/updated/get");
        let response: WatermarkResponse = fetch::get_json(&self.client, &url, self.attempts).await?;
        Ok(response.timestamp)
    }

    async fn set(&self, watermark: f64) -> Result<()> {
        let url = self.url(&format!("/datemeta/updated/set/{watermark}"));
        fetch::get_bytes(&self.client, &url, self.attempts).await?;
        Ok(())
    }
}

impl RecipientDirectory for RegistryClient {
    async fn encrypted_tokens(&self) -> Result<BTreeMap<String, String>> {
        let url = self.url("/listAll");
        let response: TokenListResponse = fetch::get_json(&self.client, &url, self.attempts).await?;
        Ok(response.tokens)
    }
}
