use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use super::error::ApnsError;
use super::token::{ApnsCredentials, ProviderToken};
use super::types::{AlertNotification, ApnsEnvironment, ErrorBody};

/// Delivers one alert to one device.
pub trait PushSender: Send + Sync {
    fn send_alert(
        &self,
        notification: &AlertNotification,
        device_token: &str,
    ) -> impl Future<Output = Result<(), ApnsError>> + Send;
}

pub struct ApnsClient {
    client: Client,
    base_url: String,
    token: ProviderToken,
}

impl ApnsClient {
    pub fn new(credentials: &ApnsCredentials, environment: ApnsEnvironment) -> Result<Self, ApnsError> {
        Self::with_base_url(credentials, environment.host().to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(credentials: &ApnsCredentials, base_url: String) -> Result<Self, ApnsError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: ProviderToken::new(credentials)?,
        })
    }
}

impl PushSender for ApnsClient {
    async fn send_alert(&self, notification: &AlertNotification, device_token: &str) -> Result<(), ApnsError> {
        let url = format!("{}/3/device/{device_token}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token.bearer()?)
            .header("apns-topic", &notification.topic)
            .header("apns-push-type", "alert")
            .header("apns-expiration", notification.expiration.header_value())
            .header("apns-priority", notification.priority.header_value())
            .json(&notification.payload())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.reason)
            .unwrap_or_else(|_| if text.is_empty() { "unknown error".to_string() } else { text });
        Err(ApnsError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }
}

/// Sender that only logs what it would have pushed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSender;

impl PushSender for DryRunSender {
    async fn send_alert(&self, notification: &AlertNotification, device_token: &str) -> Result<(), ApnsError> {
        tracing::info!(
            device = %abbreviate(device_token),
            title = %notification.title,
            body = notification.body.as_ref().map(|b| b.key).unwrap_or("-"),
            badge = notification.badge,
            "dry run: would push alert"
        );
        Ok(())
    }
}

/// First eight characters of a device token, for logs.
pub fn abbreviate(device_token: &str) -> String {
    let head: String = device_token.chars().take(8).collect();
    if head.len() < device_token.len() {
        format!("{head}…")
    } else {
        head
    }
}
