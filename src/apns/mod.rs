pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{ApnsClient, DryRunSender, PushSender, abbreviate};
pub use error::ApnsError;
pub use token::{ApnsCredentials, ProviderToken};
pub use types::{AlertNotification, ApnsEnvironment, ApnsPayload, Expiration, Priority};
