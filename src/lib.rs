//! Pushes newly published news items to every registered device through APNs.
//!
//! The [`dispatch`] module holds the bounded-concurrency queue that every
//! push goes through; [`pipeline`] drives one episode end to end.

pub mod apns;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod localize;
pub mod news;
pub mod pipeline;
pub mod registry;
pub mod ui;

pub use error::{DispatcherError, Result};
