use thiserror::Error;

use crate::apns::ApnsError;
use crate::crypto::TokenError;
use crate::dispatch::QueueError;

/// Errors that abort a dispatch episode.
///
/// Per-recipient decryption failures and per-unit delivery failures never
/// become a `DispatcherError`; they are logged and absorbed where they occur.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing secret: set {0}")]
    MissingSecret(&'static str),

    #[error("Stored watermark {0} is implausibly low")]
    ImplausibleWatermark(f64),

    #[error("Failed to fetch {url} after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    #[error("Dispatch queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Token cipher error: {0}")]
    Token(#[from] TokenError),

    #[error("APNs error: {0}")]
    Apns(#[from] ApnsError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = DispatcherError> = std::result::Result<T, E>;
